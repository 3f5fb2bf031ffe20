use serde::{Deserialize, Serialize};

use crate::data_type::LogicalType;
use crate::types::InternalId;

pub type Nullable<T> = Option<T>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Null,
    Boolean(Nullable<bool>),
    Int32(Nullable<i32>),
    Int64(Nullable<i64>),
    UInt64(Nullable<u64>),
    Float64(Nullable<f64>),
    String(Nullable<String>),
    InternalId(Nullable<InternalId>),
}

impl ScalarValue {
    /// Returns a typed null for `logical_type`.
    pub fn null_of(logical_type: LogicalType) -> Self {
        match logical_type {
            LogicalType::Boolean => ScalarValue::Boolean(None),
            LogicalType::Int32 => ScalarValue::Int32(None),
            LogicalType::Int64 => ScalarValue::Int64(None),
            LogicalType::UInt64 => ScalarValue::UInt64(None),
            LogicalType::Float64 => ScalarValue::Float64(None),
            LogicalType::String => ScalarValue::String(None),
            LogicalType::InternalId => ScalarValue::InternalId(None),
        }
    }

    /// Returns the logical type of the value, or `None` for an untyped null.
    pub fn logical_type(&self) -> Option<LogicalType> {
        match self {
            ScalarValue::Null => None,
            ScalarValue::Boolean(_) => Some(LogicalType::Boolean),
            ScalarValue::Int32(_) => Some(LogicalType::Int32),
            ScalarValue::Int64(_) => Some(LogicalType::Int64),
            ScalarValue::UInt64(_) => Some(LogicalType::UInt64),
            ScalarValue::Float64(_) => Some(LogicalType::Float64),
            ScalarValue::String(_) => Some(LogicalType::String),
            ScalarValue::InternalId(_) => Some(LogicalType::InternalId),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            ScalarValue::Null => true,
            ScalarValue::Boolean(v) => v.is_none(),
            ScalarValue::Int32(v) => v.is_none(),
            ScalarValue::Int64(v) => v.is_none(),
            ScalarValue::UInt64(v) => v.is_none(),
            ScalarValue::Float64(v) => v.is_none(),
            ScalarValue::String(v) => v.is_none(),
            ScalarValue::InternalId(v) => v.is_none(),
        }
    }

    /// Untyped nulls conform to every type.
    #[inline]
    pub fn conforms_to(&self, logical_type: LogicalType) -> bool {
        self.logical_type().is_none_or(|ty| ty == logical_type)
    }

    #[inline]
    pub fn as_internal_id(&self) -> Option<InternalId> {
        match self {
            ScalarValue::InternalId(id) => *id,
            _ => None,
        }
    }

    /// Rough number of bytes held by the value, heap allocations included.
    pub fn estimated_size(&self) -> usize {
        match self {
            ScalarValue::String(Some(s)) => size_of::<ScalarValue>() + s.capacity(),
            _ => size_of::<ScalarValue>(),
        }
    }
}

macro_rules! for_each_non_null_variant {
    ($m:ident) => {
        $m!(bool, Boolean);
        $m!(i32, Int32);
        $m!(i64, Int64);
        $m!(u64, UInt64);
        $m!(f64, Float64);
        $m!(String, String);
        $m!(InternalId, InternalId);
    };
}

macro_rules! impl_from_for_variant {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for ScalarValue {
            #[inline]
            fn from(value: $ty) -> Self {
                ScalarValue::$variant(Some(value))
            }
        }
    };
}

for_each_non_null_variant!(impl_from_for_variant);

macro_rules! impl_from_nullable_for_variant {
    ($ty:ty, $variant:ident) => {
        impl From<Nullable<$ty>> for ScalarValue {
            #[inline]
            fn from(value: Nullable<$ty>) -> Self {
                ScalarValue::$variant(value)
            }
        }
    };
}

for_each_non_null_variant!(impl_from_nullable_for_variant);

impl From<&str> for ScalarValue {
    #[inline]
    fn from(value: &str) -> Self {
        ScalarValue::String(Some(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_conforms_to_any_type() {
        assert!(ScalarValue::Null.conforms_to(LogicalType::String));
        assert!(ScalarValue::null_of(LogicalType::Int64).is_null());
        assert!(!ScalarValue::Int64(None).conforms_to(LogicalType::String));
        assert!(ScalarValue::from("alice").conforms_to(LogicalType::String));
    }

    #[test]
    fn test_internal_id_accessor() {
        let id = InternalId::new(7, 2);
        assert_eq!(ScalarValue::from(id).as_internal_id(), Some(id));
        assert_eq!(ScalarValue::Int64(Some(7)).as_internal_id(), None);
    }
}
