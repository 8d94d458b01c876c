use crate::common::*;

/// A tensor dimension that is either known or left to be inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dim {
    Size(usize),
    Infer,
}

impl Dim {
    pub fn size(&self) -> Option<usize> {
        Option::<usize>::from(*self)
    }

    pub fn is_compatible_with(&self, other: &Dim) -> bool {
        match (self, other) {
            (Self::Size(lhs), Self::Size(rhs)) => lhs == rhs,
            _ => true,
        }
    }
}

impl From<usize> for Dim {
    fn from(from: usize) -> Self {
        Self::Size(from)
    }
}

impl From<Option<usize>> for Dim {
    fn from(from: Option<usize>) -> Self {
        match from {
            Some(size) => Self::Size(size),
            None => Self::Infer,
        }
    }
}

impl From<Dim> for Option<usize> {
    fn from(from: Dim) -> Self {
        match from {
            Dim::Size(size) => Some(size),
            Dim::Infer => None,
        }
    }
}

impl Mul<Dim> for Dim {
    type Output = Dim;

    fn mul(self, rhs: Dim) -> Self::Output {
        match (self, rhs) {
            (Self::Size(lhs), Self::Size(rhs)) => Self::Size(lhs * rhs),
            _ => Self::Infer,
        }
    }
}

impl Display for Dim {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Size(size) => write!(f, "{}", size),
            Self::Infer => write!(f, "_"),
        }
    }
}

impl Serialize for Dim {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Size(value) => value.serialize(serializer),
            Self::Infer => "_".serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Dim {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde_json::Value;

        let dim = match Value::deserialize(deserializer)? {
            Value::String(text) if text == "_" => Self::Infer,
            Value::Number(value) => {
                let value = value
                    .as_u64()
                    .ok_or_else(|| D::Error::custom(format!("'{}' is not a dimension", value)))?;
                Self::Size(value as usize)
            }
            value => {
                return Err(D::Error::custom(format!("'{}' is not a dimension", value)));
            }
        };
        Ok(dim)
    }
}
