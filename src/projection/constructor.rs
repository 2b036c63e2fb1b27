//! Constructor-based binding
//!
//! Columns are passed positionally. Both flavours check column count and
//! static column types against the parameters when the projection is built,
//! not when rows arrive.

use crate::error::QueryError;
use crate::value::{AttrType, FromValue, Value};

/// Record built through a designated constructor
pub trait ConstructorTarget: Sized {
    /// Parameter types in order; `None` accepts any column
    const PARAMETERS: &'static [Option<AttrType>];

    fn construct(values: Vec<Value>) -> Result<Self, QueryError>;
}

/// Closure usable as a constructor, with parameter types taken from its signature
pub trait TypedConstructor<Args, T>: Send + Sync + 'static {
    fn parameters() -> Vec<Option<AttrType>>;

    fn construct(&self, values: Vec<Value>) -> Result<T, QueryError>;
}

fn next_arg<A: FromValue>(
    values: &mut std::vec::IntoIter<Value>,
    position: usize,
) -> Result<A, QueryError> {
    let value = values.next().ok_or_else(|| {
        QueryError::Conversion(format!("missing constructor argument {position}"))
    })?;
    A::from_value(value)
}

macro_rules! typed_constructor {
    ($($arg:ident : $pos:expr),+) => {
        impl<F, T, $($arg),+> TypedConstructor<($($arg,)+), T> for F
        where
            F: Fn($($arg),+) -> T + Send + Sync + 'static,
            $($arg: FromValue,)+
        {
            fn parameters() -> Vec<Option<AttrType>> {
                vec![$($arg::ATTR_TYPE),+]
            }

            fn construct(&self, values: Vec<Value>) -> Result<T, QueryError> {
                let mut values = values.into_iter();
                Ok(self($(next_arg::<$arg>(&mut values, $pos)?),+))
            }
        }
    };
}

typed_constructor!(A: 0);
typed_constructor!(A: 0, B: 1);
typed_constructor!(A: 0, B: 1, C: 2);
typed_constructor!(A: 0, B: 1, C: 2, D: 3);
typed_constructor!(A: 0, B: 1, C: 2, D: 3, E: 4);
typed_constructor!(A: 0, B: 1, C: 2, D: 3, E: 4, G: 5);

/// Check projected column types against constructor parameters
pub(crate) fn check_parameters(
    target: &str,
    columns: &[(String, Option<AttrType>)],
    parameters: &[Option<AttrType>],
) -> Result<(), QueryError> {
    if columns.len() != parameters.len() {
        return Err(QueryError::ConstructorArityMismatch {
            target: target.to_string(),
            reason: format!(
                "{} projected columns for {} parameters",
                columns.len(),
                parameters.len()
            ),
        });
    }
    for (i, ((label, column), parameter)) in columns.iter().zip(parameters).enumerate() {
        if let (Some(column), Some(parameter)) = (column, parameter) {
            if !parameter.comparable_with(*column) {
                return Err(QueryError::ConstructorArityMismatch {
                    target: target.to_string(),
                    reason: format!(
                        "column {i} ({label}) is {column}, parameter expects {parameter}"
                    ),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_of<Args, T, F: TypedConstructor<Args, T>>(_f: &F) -> Vec<Option<AttrType>> {
        F::parameters()
    }

    #[test]
    fn test_closure_signature_gives_parameters() {
        let f = |name: String, age: Option<i32>| (name, age);
        assert_eq!(
            params_of(&f),
            vec![Some(AttrType::String), Some(AttrType::Integer)]
        );
        let built = f
            .construct(vec![Value::from("member1"), Value::Null])
            .unwrap();
        assert_eq!(built, ("member1".to_string(), None));
    }

    #[test]
    fn test_check_parameters() {
        let columns = vec![
            ("username".to_string(), Some(AttrType::String)),
            ("age".to_string(), Some(AttrType::Integer)),
        ];
        assert!(check_parameters("Dto", &columns, &[Some(AttrType::String), None]).is_ok());
        assert!(check_parameters("Dto", &columns, &[Some(AttrType::String)]).is_err());
        let err = check_parameters(
            "Dto",
            &columns,
            &[Some(AttrType::String), Some(AttrType::String)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("column 1 (age)"));
    }
}
