use crate::{common::*, dim::Dim};

/// The shape of a tensor, where each dimension may be unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape(Vec<Dim>);

impl Shape {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn dims(&self) -> &[Dim] {
        &self.0
    }

    pub fn size4(&self) -> Option<[Dim; 4]> {
        match *self.as_ref() {
            [s1, s2, s3, s4] => Some([s1, s2, s3, s4]),
            _ => None,
        }
    }

    /// Returns the shape with the leading batch dimension marked as unknown.
    pub fn without_batch(&self) -> Shape {
        let mut dims = self.0.clone();
        if let Some(first) = dims.first_mut() {
            *first = Dim::Infer;
        }
        Shape(dims)
    }

    /// Collapses all dimensions from `start_dim` on into one, like `Tensor::flatten`.
    pub fn flatten_from(&self, start_dim: usize) -> Option<Shape> {
        if start_dim >= self.0.len() {
            return None;
        }
        let (head, tail) = self.0.split_at(start_dim);
        let flat = tail
            .iter()
            .copied()
            .fold(Dim::Size(1), |product, dim| product * dim);
        Some(Shape(head.iter().copied().chain([flat]).collect()))
    }

    pub fn is_compatible_with(&self, other: &Shape) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(lhs, rhs)| lhs.is_compatible_with(rhs))
    }
}

impl AsRef<[Dim]> for Shape {
    fn as_ref(&self) -> &[Dim] {
        &self.0
    }
}

impl<const SIZE: usize> From<[Dim; SIZE]> for Shape {
    fn from(from: [Dim; SIZE]) -> Self {
        Self(from.into())
    }
}

impl<const SIZE: usize> From<[usize; SIZE]> for Shape {
    fn from(from: [usize; SIZE]) -> Self {
        Self(from.iter().copied().map(Dim::from).collect())
    }
}

impl From<Vec<usize>> for Shape {
    fn from(vec: Vec<usize>) -> Self {
        Self(vec.into_iter().map(Dim::from).collect())
    }
}

/// Converts tensor sizes as reported by libtorch.
impl From<&[i64]> for Shape {
    fn from(sizes: &[i64]) -> Self {
        Self(sizes.iter().map(|&size| Dim::Size(size as usize)).collect())
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (index, dim) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", dim)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_feature_map() {
        let shape = Shape::from([2usize, 256, 1, 1]);
        assert_eq!(shape.flatten_from(1), Some(Shape::from([2usize, 256])));
        assert_eq!(
            shape.without_batch().flatten_from(1),
            Some(Shape::from([Dim::Infer, Dim::Size(256)]))
        );
        assert_eq!(shape.flatten_from(4), None);
    }

    #[test]
    fn shape_compatibility() {
        let expect = Shape::from([Dim::Infer, Dim::Size(128)]);
        assert!(Shape::from([4usize, 128]).is_compatible_with(&expect));
        assert!(!Shape::from([4usize, 64]).is_compatible_with(&expect));
        assert!(!Shape::from([4usize, 128, 1]).is_compatible_with(&expect));
        assert_eq!(expect.to_string(), "[_, 128]");
    }

    #[test]
    fn from_tensor_sizes() {
        let sizes: &[i64] = &[2, 3, 32, 32];
        let shape = Shape::from(sizes);
        assert_eq!(shape.size4(), Some([Dim::Size(2), Dim::Size(3), Dim::Size(32), Dim::Size(32)]));
    }
}
