#[cfg(feature = "tch")]
pub use impls::*;
#[cfg(feature = "tch")]
mod impls;

#[cfg(feature = "tch")]
pub use r#trait::*;
#[cfg(feature = "tch")]
mod r#trait;

/// Activation functions selectable for the backbone blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Activation {
    /// x * sigmoid(x), the YOLOv8 default.
    Silu,
    Mish,
    Relu,
    LRelu,
    Logistic,
    Linear,
}

impl Default for Activation {
    fn default() -> Self {
        Self::Silu
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn activation_names() {
        let act: Activation = serde_json::from_str(r#""silu""#).unwrap();
        assert_eq!(act, Activation::Silu);
        let text = serde_json::to_string(&Activation::LRelu).unwrap();
        assert_eq!(text, r#""l_relu""#);
    }
}
