//! Neural Network inference.

use std::{
    ops::{Index, RangeInclusive},
    path::Path,
    sync::Arc,
};

use tract_onnx::prelude::{
    tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec, Tensor, TypedFact,
    TypedOp,
};

use crate::image::{Color, Image, Rect, Resolution};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A neural network that can be used for inference.
///
/// This is a cheaply [`Clone`]able handle to the underlying network structures.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Model>);

impl NeuralNetwork {
    /// Loads a pre-trained model from an ONNX file path.
    ///
    /// The path must have a `.onnx` extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::from_path_impl(path.as_ref())
    }

    fn from_path_impl(path: &Path) -> anyhow::Result<Self> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => anyhow::bail!(
                "neural network file '{}' must have `.onnx` extension",
                path.display()
            ),
        }

        let model_data = std::fs::read(path).map_err(|e| {
            anyhow::anyhow!("failed to read neural network '{}': {}", path.display(), e)
        })?;
        Self::from_onnx(&model_data)
    }

    /// Loads and optimizes a pre-trained model from an in-memory ONNX file.
    ///
    /// Returns an error if the network data is malformed, if the network data is incomplete, or if
    /// the network uses unimplemented operations.
    pub fn from_onnx(raw: &[u8]) -> anyhow::Result<Self> {
        let graph = tract_onnx::onnx()
            .model_for_read(&mut &*raw)?
            .into_optimized()?;
        let model = SimplePlan::new(graph)?;
        Ok(Self(Arc::new(model)))
    }

    /// Returns the number of input nodes of the network.
    pub fn num_inputs(&self) -> usize {
        self.0.model().inputs.len()
    }

    /// Returns the number of output nodes of the network.
    pub fn num_outputs(&self) -> usize {
        self.0.model().outputs.len()
    }

    /// Returns the tensor shape of the input with the given index.
    pub fn input_shape(&self, index: usize) -> anyhow::Result<&[usize]> {
        let fact = self.0.model().input_fact(index)?;
        fact.shape
            .as_concrete()
            .ok_or_else(|| anyhow::anyhow!("network input {} has a symbolic shape", index))
    }

    /// Runs the network on a single input tensor, returning the estimated [`Outputs`].
    #[doc(alias = "infer")]
    pub fn estimate(&self, input: Tensor) -> anyhow::Result<Outputs> {
        let inner = self.0.run(tvec![TValue::from_const(Arc::new(input))])?;
        Ok(Outputs { inner })
    }
}

/// A convolutional neural network (CNN) that operates on image data.
///
/// The network must take a single `[1, 3, H, W]` (NCHW) input tensor.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    input_res: Resolution,
    color_mapper: ColorMapper,
}

impl Cnn {
    pub fn new(nn: NeuralNetwork, color_mapper: ColorMapper) -> anyhow::Result<Self> {
        if nn.num_inputs() != 1 {
            anyhow::bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                nn.num_inputs(),
            );
        }

        let input_res = match nn.input_shape(0)? {
            [1, 3, h, w] => Resolution::new(u32::try_from(*w)?, u32::try_from(*h)?),
            shape => anyhow::bail!("invalid model input shape for NCHW CNN: {:?}", shape),
        };

        Ok(Self {
            nn,
            input_res,
            color_mapper,
        })
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    #[inline]
    pub fn num_outputs(&self) -> usize {
        self.nn.num_outputs()
    }

    /// Runs the network on the part of `image` covered by `rect`.
    ///
    /// `rect` is stretched to the network's input resolution. Parts of `rect` outside of `image`
    /// are fed to the network as black pixels.
    pub fn estimate(&self, image: &Image, rect: Rect) -> anyhow::Result<Outputs> {
        let data = image_to_nchw(image, rect, self.input_res, &self.color_mapper);
        let shape = [
            1,
            3,
            self.input_res.height() as usize,
            self.input_res.width() as usize,
        ];
        let tensor = Tensor::from_shape(&shape, &data)?;
        self.nn.estimate(tensor)
    }
}

/// Samples `rect` of `image` at `res` and lays the channels out as a planar `[3, H, W]` buffer.
fn image_to_nchw(image: &Image, rect: Rect, res: Resolution, mapper: &ColorMapper) -> Vec<f32> {
    let (w, h) = (res.width() as usize, res.height() as usize);
    let plane = w * h;
    let mut data = vec![0.0; 3 * plane];

    for y in 0..h {
        for x in 0..w {
            let u = (x as f32 + 0.5) / w as f32;
            let v = (y as f32 + 0.5) / h as f32;
            let [ix, iy] = rect.denormalize(u, v);
            let color = image.get(ix.floor() as i32, iy.floor() as i32);
            let rgb = mapper.map(color);
            for (c, value) in rgb.into_iter().enumerate() {
                data[c * plane + y * w + x] = value;
            }
        }
    }

    data
}

/// Maps 8-bit sRGB colors to the value range a network expects.
#[derive(Debug, Clone)]
pub struct ColorMapper {
    target_range: RangeInclusive<f32>,
}

impl ColorMapper {
    /// Creates a simple color mapper that uniformly maps sRGB values to `target_range`.
    ///
    /// Note that this operates on *non-linear* sRGB colors, but maps them linearly to the target
    /// range.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        assert!(target_range.end() > target_range.start());
        Self { target_range }
    }

    /// Maps the red, green and blue channels of `color`. Alpha is ignored.
    fn map(&self, color: Color) -> [f32; 3] {
        let start = *self.target_range.start();
        let end = *self.target_range.end();

        let adjust_range = (end - start) / 255.0;
        let rgb = [color.r(), color.g(), color.b()];
        rgb.map(|col| col as f32 * adjust_range + start)
    }
}

/// The result of a neural network inference pass.
///
/// This is a list of tensors corresponding to the network's output nodes.
#[derive(Debug)]
pub struct Outputs {
    inner: TVec<TValue>,
}

impl Outputs {
    #[cfg(test)]
    pub(crate) fn from_tensors(tensors: impl IntoIterator<Item = Tensor>) -> Self {
        Self {
            inner: tensors
                .into_iter()
                .map(|t| TValue::from_const(Arc::new(t)))
                .collect(),
        }
    }

    /// Returns the number of tensors in this inference output.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Index<usize> for Outputs {
    type Output = Tensor;

    fn index(&self, index: usize) -> &Tensor {
        &self.inner[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mapper() {
        let mapper = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [-1.0, -1.0, -1.0]);
        assert_eq!(mapper.map(Color::WHITE), [1.0, 1.0, 1.0]);

        let mapper = ColorMapper::linear(0.0..=1.0);
        assert_eq!(mapper.map(Color::RED), [1.0, 0.0, 0.0]);
        assert_eq!(mapper.map(Color::NULL), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn nchw_layout_and_letterbox() {
        // 2x1 image: red on the left, blue on the right, letterboxed into a 2x2 input.
        let mut image = Image::new(2, 1);
        image.set(0, 0, Color::RED);
        image.set(1, 0, Color::BLUE);
        let rect = image
            .resolution()
            .letterbox(crate::image::AspectRatio::SQUARE);

        let data = image_to_nchw(
            &image,
            rect,
            Resolution::new(2, 2),
            &ColorMapper::linear(0.0..=1.0),
        );

        // The letterbox spans y=-0.5..1.5, so the top row samples the image and the bottom row
        // samples the black bar.
        #[rustfmt::skip]
        let expected = [
            // R
            1.0, 0.0,
            0.0, 0.0,
            // G
            0.0, 0.0,
            0.0, 0.0,
            // B
            0.0, 1.0,
            0.0, 0.0,
        ];
        assert_eq!(data, expected);
    }

    #[test]
    fn from_path_requires_onnx_extension() {
        let err = NeuralNetwork::from_path("hand_landmark.tflite")
            .err()
            .unwrap();
        assert!(err.to_string().contains("`.onnx` extension"));
    }
}
