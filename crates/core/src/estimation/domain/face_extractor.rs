use fast_image_resize as fr;
use ndarray::ArrayView3;

use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::geometry::{clamp_crop, BoundingBox, CropRegion};

pub const DEFAULT_MARGIN_PERCENT: u32 = 40;
pub const DEFAULT_FACE_SIZE: u32 = 64;

/// Fixed-size square RGB face image ready for batch inference.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceCrop {
    data: Vec<u8>,
    size: u32,
}

impl FaceCrop {
    pub fn new(data: Vec<u8>, size: u32) -> Self {
        debug_assert_eq!(data.len(), (size as usize).pow(2) * 3);
        Self { data, size }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        let s = self.size as usize;
        ArrayView3::from_shape((s, s, 3), &self.data).expect("FaceCrop data must be size*size*3")
    }
}

/// Crops margin-expanded face regions and resamples them to a square.
///
/// Resampling uses a box convolution, i.e. area averaging when shrinking,
/// which keeps high-frequency detail from aliasing into the crop.
pub struct FaceExtractor {
    margin_percent: u32,
    output_size: u32,
    resizer: fr::Resizer,
    crop_buf: Vec<u8>,
}

impl FaceExtractor {
    pub fn new(margin_percent: u32, output_size: u32) -> Result<Self, PipelineError> {
        if output_size == 0 {
            return Err(PipelineError::invalid("face crop size must be positive"));
        }
        Ok(Self {
            margin_percent,
            output_size,
            resizer: fr::Resizer::new(),
            crop_buf: Vec::new(),
        })
    }

    /// Crops `frame` around `bbox` (or the whole frame when `None`) and
    /// resamples to `output_size` x `output_size`.
    ///
    /// Returns the crop together with the region it was taken from so the
    /// caller can outline it. The frame is left untouched.
    pub fn extract(
        &mut self,
        frame: &Frame,
        bbox: Option<&BoundingBox>,
    ) -> Result<(FaceCrop, CropRegion), PipelineError> {
        if frame.channels() != 3 {
            return Err(PipelineError::invalid(format!(
                "expected a 3-channel frame, got {} channels",
                frame.channels()
            )));
        }
        let (fw, fh) = (frame.width(), frame.height());
        if fw == 0 || fh == 0 {
            return Err(PipelineError::invalid(format!(
                "frame has zero area ({fw}x{fh})"
            )));
        }

        let bbox = bbox.copied().unwrap_or_else(|| BoundingBox::full_frame(fw, fh));
        let region = clamp_crop(&bbox, self.margin_percent, fw, fh);
        if region.is_empty() {
            return Err(PipelineError::EmptyRegion(region));
        }
        if !region.fits_within(fw, fh) {
            return Err(PipelineError::invalid(format!(
                "crop region {region:?} lies outside the {fw}x{fh} frame"
            )));
        }

        self.copy_region(frame, &region);
        let crop = self.resample(region.width as u32, region.height as u32)?;
        Ok((crop, region))
    }

    fn copy_region(&mut self, frame: &Frame, region: &CropRegion) {
        let src_stride = frame.width() as usize * 3;
        let row_len = region.width as usize * 3;
        let x_offset = region.x as usize * 3;
        let data = frame.data();

        self.crop_buf.clear();
        self.crop_buf.reserve(row_len * region.height as usize);
        for row in region.y as usize..(region.y + region.height) as usize {
            let start = row * src_stride + x_offset;
            self.crop_buf
                .extend_from_slice(&data[start..start + row_len]);
        }
    }

    fn resample(&mut self, width: u32, height: u32) -> Result<FaceCrop, PipelineError> {
        let src = fr::images::ImageRef::new(width, height, &self.crop_buf, fr::PixelType::U8x3)
            .map_err(|e| PipelineError::invalid(format!("crop buffer rejected: {e}")))?;
        let mut dst =
            fr::images::Image::new(self.output_size, self.output_size, fr::PixelType::U8x3);
        let options =
            fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Box));
        self.resizer
            .resize(&src, &mut dst, Some(&options))
            .map_err(|e| PipelineError::invalid(format!("resampling failed: {e}")))?;
        Ok(FaceCrop::new(dst.into_vec(), self.output_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn assert_all_close(crop: &FaceCrop, rgb: [u8; 3]) {
        for px in crop.data().chunks_exact(3) {
            for c in 0..3 {
                assert!(
                    (px[c] as i32 - rgb[c] as i32).abs() <= 1,
                    "pixel {px:?} differs from {rgb:?}"
                );
            }
        }
    }

    /// 100x100 red frame with a green square at (40, 40) of edge 20.
    fn frame_with_green_square() -> Frame {
        let mut frame = Frame::filled(100, 100, [255, 0, 0], 0);
        {
            let mut arr = frame.as_ndarray_mut();
            for y in 40..60 {
                for x in 40..60 {
                    arr[[y, x, 0]] = 0;
                    arr[[y, x, 1]] = 255;
                }
            }
        }
        frame
    }

    #[test]
    fn test_zero_output_size_rejected() {
        assert!(matches!(
            FaceExtractor::new(40, 0),
            Err(PipelineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_crop_has_requested_size() {
        let mut extractor = FaceExtractor::new(40, 64).unwrap();
        let frame = Frame::filled(640, 480, [10, 20, 30], 0);
        let (crop, region) = extractor
            .extract(&frame, Some(&BoundingBox::new(100, 100, 50, 50)))
            .unwrap();
        assert_eq!(crop.size(), 64);
        assert_eq!(crop.data().len(), 64 * 64 * 3);
        assert_eq!(crop.as_ndarray().shape(), &[64, 64, 3]);
        assert_eq!(region, CropRegion::new(80, 80, 90, 90));
        assert_all_close(&crop, [10, 20, 30]);
    }

    #[test]
    fn test_crop_reads_only_the_region() {
        let mut extractor = FaceExtractor::new(0, 8).unwrap();
        let frame = frame_with_green_square();
        let (crop, region) = extractor
            .extract(&frame, Some(&BoundingBox::new(40, 40, 20, 20)))
            .unwrap();
        assert_eq!(region, CropRegion::new(40, 40, 20, 20));
        assert_all_close(&crop, [0, 255, 0]);
    }

    #[test]
    fn test_frame_is_not_modified() {
        let mut extractor = FaceExtractor::new(40, 16).unwrap();
        let frame = frame_with_green_square();
        let before = frame.data().to_vec();
        extractor
            .extract(&frame, Some(&BoundingBox::new(30, 30, 40, 40)))
            .unwrap();
        assert_eq!(frame.data(), &before[..]);
    }

    #[test]
    fn test_whole_frame_when_box_absent() {
        let mut extractor = FaceExtractor::new(40, 32).unwrap();
        let frame = Frame::filled(120, 90, [200, 100, 50], 0);
        let (crop, region) = extractor.extract(&frame, None).unwrap();
        assert!(region.fits_within(120, 90));
        assert_eq!((region.x, region.y), (0, 0));
        assert_all_close(&crop, [200, 100, 50]);
    }

    #[test]
    fn test_area_averaging_preserves_mean() {
        // 1-pixel checkerboard of 0/200 shrunk 8x averages to ~100.
        let mut frame = Frame::filled(64, 64, [0, 0, 0], 0);
        {
            let mut arr = frame.as_ndarray_mut();
            for y in 0..64 {
                for x in 0..64 {
                    if (x + y) % 2 == 0 {
                        for c in 0..3 {
                            arr[[y, x, c]] = 200;
                        }
                    }
                }
            }
        }
        let mut extractor = FaceExtractor::new(0, 8).unwrap();
        let (crop, _) = extractor
            .extract(&frame, Some(&BoundingBox::new(0, 0, 64, 64)))
            .unwrap();
        let mean =
            crop.data().iter().map(|&v| v as f64).sum::<f64>() / crop.data().len() as f64;
        assert!((mean - 100.0).abs() < 5.0, "mean was {mean}");
    }

    #[test]
    fn test_upscales_small_regions() {
        let mut extractor = FaceExtractor::new(0, 64).unwrap();
        let frame = Frame::filled(10, 10, [5, 6, 7], 0);
        let (crop, region) = extractor
            .extract(&frame, Some(&BoundingBox::new(2, 2, 4, 4)))
            .unwrap();
        assert_eq!(region, CropRegion::new(2, 2, 4, 4));
        assert_eq!(crop.size(), 64);
        assert_all_close(&crop, [5, 6, 7]);
    }

    #[rstest]
    #[case::zero_width(BoundingBox::new(10, 10, 0, 20))]
    #[case::zero_height(BoundingBox::new(10, 10, 20, 0))]
    fn test_degenerate_box_is_empty_region(#[case] bbox: BoundingBox) {
        let mut extractor = FaceExtractor::new(40, 64).unwrap();
        let frame = Frame::filled(100, 100, [0, 0, 0], 0);
        let err = extractor.extract(&frame, Some(&bbox)).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyRegion(_)));
    }

    #[test]
    fn test_one_pixel_frame_is_empty_region() {
        let mut extractor = FaceExtractor::new(100, 64).unwrap();
        let frame = Frame::filled(1, 1, [0, 0, 0], 0);
        let err = extractor.extract(&frame, None).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyRegion(_)));
    }

    #[test]
    fn test_single_channel_frame_rejected() {
        let mut extractor = FaceExtractor::new(40, 64).unwrap();
        let frame = Frame::new(vec![0; 100], 10, 10, 1, 0);
        let err = extractor.extract(&frame, None).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
    }

    #[test]
    fn test_edge_box_is_extracted_within_bounds() {
        let mut extractor = FaceExtractor::new(40, 64).unwrap();
        let frame = Frame::filled(640, 480, [1, 2, 3], 0);
        let (_, region) = extractor
            .extract(&frame, Some(&BoundingBox::new(600, 440, 40, 40)))
            .unwrap();
        assert!(region.fits_within(640, 480));
    }
}
