//! Layout of stored observations.
use crate::error::MpcError;
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde::{Deserialize, Serialize};

/// Kind of observation, resolved once from the first stored frame.
///
/// Image frames come from the simulator as `[height, width, channels]` (or
/// `[height, width]` for a single channel) and are stored channel-first.
/// Flat vectors, such as low-dimensional state, are stored as they are and
/// never stacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObservationKind {
    /// Channel-first image.
    Image {
        /// Number of channels of a single frame.
        channels: usize,
        /// Height in pixels.
        height: usize,
        /// Width in pixels.
        width: usize,
    },

    /// Flat vector.
    Vector {
        /// Length of the vector.
        dim: usize,
    },
}

impl ObservationKind {
    /// Infers the kind from the shape of a raw frame.
    pub fn from_frame_shape(shape: &[usize]) -> Result<Self, MpcError> {
        match *shape {
            [dim] => Ok(Self::Vector { dim }),
            [height, width] => Ok(Self::Image {
                channels: 1,
                height,
                width,
            }),
            [height, width, channels] => Ok(Self::Image {
                channels,
                height,
                width,
            }),
            _ => Err(MpcError::UnsupportedShape(shape.to_vec())),
        }
    }

    /// Shape of a single stored frame.
    pub fn stored_shape(&self) -> Vec<usize> {
        match *self {
            Self::Image {
                channels,
                height,
                width,
            } => vec![channels, height, width],
            Self::Vector { dim } => vec![dim],
        }
    }

    /// Shape of an encoded observation stacking `frame_history_len` frames
    /// along the channel axis.
    pub fn encoded_shape(&self, frame_history_len: usize) -> Vec<usize> {
        match *self {
            Self::Image {
                channels,
                height,
                width,
            } => vec![channels * frame_history_len, height, width],
            Self::Vector { dim } => vec![dim],
        }
    }

    /// Returns `true` for image observations.
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }

    /// Converts a raw frame into the stored layout.
    ///
    /// Fails with [`MpcError::ShapeMismatch`] if the frame was not produced
    /// with the shape this kind was inferred from.
    pub fn to_stored<T: Clone>(&self, frame: ArrayViewD<T>) -> Result<ArrayD<T>, MpcError> {
        let found = frame.shape().to_vec();
        if Self::from_frame_shape(&found)? != *self {
            return Err(MpcError::ShapeMismatch {
                expected: self.raw_shape(&found),
                found,
            });
        }

        match *self {
            Self::Image {
                channels,
                height,
                width,
            } => {
                if found.len() == 2 {
                    Ok(frame
                        .as_standard_layout()
                        .into_owned()
                        .into_shape(IxDyn(&[channels, height, width]))
                        .map_err(|_| MpcError::UnsupportedShape(found.clone()))?)
                } else {
                    // [h, w, c] -> [c, h, w]
                    Ok(frame
                        .permuted_axes(vec![2, 0, 1])
                        .as_standard_layout()
                        .into_owned())
                }
            }
            Self::Vector { .. } => Ok(frame.to_owned()),
        }
    }

    // Raw shape in the same rank as `like`, for error messages.
    fn raw_shape(&self, like: &[usize]) -> Vec<usize> {
        match *self {
            Self::Image {
                channels,
                height,
                width,
            } => {
                if channels == 1 && like.len() == 2 {
                    vec![height, width]
                } else {
                    vec![height, width, channels]
                }
            }
            Self::Vector { dim } => vec![dim],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_kind_from_shape() {
        assert_eq!(
            ObservationKind::from_frame_shape(&[5]).unwrap(),
            ObservationKind::Vector { dim: 5 }
        );
        assert_eq!(
            ObservationKind::from_frame_shape(&[4, 6, 3]).unwrap(),
            ObservationKind::Image {
                channels: 3,
                height: 4,
                width: 6
            }
        );
        assert_eq!(
            ObservationKind::from_frame_shape(&[4, 6]).unwrap().stored_shape(),
            vec![1, 4, 6]
        );
        assert!(matches!(
            ObservationKind::from_frame_shape(&[]),
            Err(MpcError::UnsupportedShape(_))
        ));
        assert!(matches!(
            ObservationKind::from_frame_shape(&[1, 2, 3, 4]),
            Err(MpcError::UnsupportedShape(_))
        ));
    }

    #[test]
    fn test_to_stored_is_channel_first() {
        // pixel (y, x) of channel c has value 100 * c + 10 * y + x
        let frame = Array3::from_shape_fn((2, 3, 2), |(y, x, c)| (100 * c + 10 * y + x) as u8)
            .into_dyn();
        let kind = ObservationKind::from_frame_shape(frame.shape()).unwrap();
        let stored = kind.to_stored(frame.view()).unwrap();

        assert_eq!(stored.shape(), &[2, 2, 3]);
        assert_eq!(stored[[1, 0, 2]], 102);
        assert_eq!(stored[[0, 1, 1]], 11);
        assert_eq!(kind.encoded_shape(4), vec![8, 2, 3]);
    }

    #[test]
    fn test_to_stored_rejects_other_shape() {
        let kind = ObservationKind::Image {
            channels: 3,
            height: 2,
            width: 2,
        };
        let frame = ArrayD::<u8>::zeros(IxDyn(&[2, 3, 3]));
        assert_eq!(
            kind.to_stored(frame.view()),
            Err(MpcError::ShapeMismatch {
                expected: vec![2, 2, 3],
                found: vec![2, 3, 3],
            })
        );
    }
}
