//! Per-operator lowering rules
//!
//! Each handler creates the layer nodes for one operator record, declares
//! the variables its inputs read and its outputs define, and leaves the
//! actual wiring to the resolver.

use tracing::debug;

use crate::converter::op_kind::OpKind;
use crate::converter::resolver::Resolver;
use crate::error::{ConvertError, ConvertResult};
use crate::graph::{
    BatchNormParams, Conv2dParams, InputRef, Layer, OutputRef, Padding, Pool2dParams,
    SpaceToBatchParams,
};
use crate::program::OperatorDescriptor;
use crate::tensor::DenseTensor;

pub(crate) fn lower(
    r: &mut Resolver<'_>,
    kind: OpKind,
    op: &OperatorDescriptor,
    index: usize,
) -> ConvertResult<()> {
    match kind {
        OpKind::Feed => feed(r, op, index),
        OpKind::Fetch => fetch(r, op, index),
        OpKind::Conv2d => conv2d(r, op, index),
        OpKind::ElementwiseAdd => elementwise_add(r, op, index),
        OpKind::BatchNorm => batch_norm(r, op, index),
        OpKind::Relu => unary(r, op, index, Layer::Relu),
        OpKind::Pool2d => pool2d(r, op, index),
        OpKind::Reshape => reshape(r, op, index),
        OpKind::Softmax => unary(r, op, index, Layer::Softmax),
    }
}

/// Non-negative integer attribute value
fn dim(op: &OperatorDescriptor, attr: &str, value: i64) -> ConvertResult<usize> {
    usize::try_from(value).map_err(|_| {
        ConvertError::unsupported_config(&op.op_type, format!("negative {} value {}", attr, value))
    })
}

/// `strides` attribute with zeros read as one
fn strides(op: &OperatorDescriptor) -> ConvertResult<[usize; 2]> {
    let [h, w] = op.attr_pair("strides")?;
    Ok([dim(op, "strides", h)?.max(1), dim(op, "strides", w)?.max(1)])
}

fn feed(r: &mut Resolver<'_>, op: &OperatorDescriptor, index: usize) -> ConvertResult<()> {
    let out = op.output("Out")?;
    let shape = r.var_shape(out)?;

    let folded = r.config().fold_fed_payloads && r.source().is_some_and(|s| s.contains(out));
    let node = if folded {
        debug!(variable = out, "fed variable has a payload, folding to constant");
        let tensor = r.load_weights(out, &shape)?;
        r.add_node(Layer::Constant(tensor), out, vec![], vec![shape])?
    } else {
        let node = r.add_node(Layer::Input, out, vec![], vec![shape])?;
        r.register_input(node);
        node
    };
    r.produce(out, node, 0, index);
    Ok(())
}

fn fetch(r: &mut Resolver<'_>, op: &OperatorDescriptor, index: usize) -> ConvertResult<()> {
    let x = op.input("X")?;
    let shape = r.var_shape(x)?;
    let node = r.add_node(Layer::Output, x, vec![shape], vec![])?;
    r.consume(node, 0, x, index);
    r.register_output(node);
    Ok(())
}

/// Single-input, single-output layer with no parameters taken from `op`
fn unary(
    r: &mut Resolver<'_>,
    op: &OperatorDescriptor,
    index: usize,
    layer: Layer,
) -> ConvertResult<()> {
    let x = op.input("X")?;
    let out = op.output("Out")?;
    let node = r.add_node(layer, out, vec![r.var_shape(x)?], vec![r.var_shape(out)?])?;
    r.consume(node, 0, x, index);
    r.produce(out, node, 0, index);
    Ok(())
}

fn elementwise_add(r: &mut Resolver<'_>, op: &OperatorDescriptor, index: usize) -> ConvertResult<()> {
    let x = op.input("X")?;
    let y = op.input("Y")?;
    let out = op.output("Out")?;
    let node = r.add_node(
        Layer::Add,
        out,
        vec![r.var_shape(x)?, r.var_shape(y)?],
        vec![r.var_shape(out)?],
    )?;
    r.consume(node, 0, x, index);
    r.consume(node, 1, y, index);
    r.produce(out, node, 0, index);
    Ok(())
}

fn batch_norm(r: &mut Resolver<'_>, op: &OperatorDescriptor, index: usize) -> ConvertResult<()> {
    let x = op.input("X")?;
    let y = op.output("Y")?;
    let epsilon = op.attr_float("epsilon")?;

    let stat = |role: &str| -> ConvertResult<_> {
        let name = op.input(role)?;
        let shape = r.var_shape(name)?;
        r.load_weights(name, &shape)
    };
    let params = BatchNormParams {
        scale: stat("Scale")?,
        offset: stat("Bias")?,
        mean: stat("Mean")?,
        variance: stat("Variance")?,
        epsilon,
    };

    let node = r.add_node(
        Layer::BatchNormalization(params),
        y,
        vec![r.var_shape(x)?],
        vec![r.var_shape(y)?],
    )?;
    r.consume(node, 0, x, index);
    r.produce(y, node, 0, index);
    Ok(())
}

fn pool2d(r: &mut Resolver<'_>, op: &OperatorDescriptor, index: usize) -> ConvertResult<()> {
    let pooling = op.attr_str("pooling_type")?;
    if pooling != "avg" {
        return Err(ConvertError::unsupported_config(
            &op.op_type,
            format!("pooling type '{}'", pooling),
        ));
    }

    let x = op.input("X")?;
    let out = op.output("Out")?;
    let in_shape = r.var_shape(x)?;

    let [filter_h, filter_w] = if op.attr_bool_or("global_pooling", false)? {
        match in_shape.as_slice() {
            &[_, _, h, w] => [h, w],
            other => {
                return Err(ConvertError::unsupported_config(
                    &op.op_type,
                    format!("global pooling over rank {} input", other.len()),
                ))
            }
        }
    } else {
        let [h, w] = op.attr_pair("ksize")?;
        [dim(op, "ksize", h)?, dim(op, "ksize", w)?]
    };
    let [stride_h, stride_w] = strides(op)?;

    let params = Pool2dParams {
        padding: Padding::Valid,
        filter_h,
        filter_w,
        stride_h,
        stride_w,
    };
    let node = r.add_node(
        Layer::AveragePool2d(params),
        out,
        vec![in_shape],
        vec![r.var_shape(out)?],
    )?;
    r.consume(node, 0, x, index);
    r.produce(out, node, 0, index);
    Ok(())
}

fn reshape(r: &mut Resolver<'_>, op: &OperatorDescriptor, index: usize) -> ConvertResult<()> {
    let target = op.attr_ints("shape")?.to_vec();
    unary(r, op, index, Layer::Reshape(target))
}

fn conv2d(r: &mut Resolver<'_>, op: &OperatorDescriptor, index: usize) -> ConvertResult<()> {
    let input = op.input("Input")?;
    let filter = op.input("Filter")?;
    let output = op.output("Output")?;

    let filter_shape = r.var_shape(filter)?;
    if filter_shape.len() != 4 {
        return Err(ConvertError::unsupported_config(
            &op.op_type,
            format!("filter '{}' has rank {}, expected 4", filter, filter_shape.len()),
        ));
    }
    let (out_channels, kh, kw) = (filter_shape[0], filter_shape[2], filter_shape[3]);

    let [pad_h, pad_w] = op.attr_pair("paddings")?;
    let [stride_h, stride_w] = strides(op)?;
    let groups = op.attr_int("groups")?;

    if op.attrs.contains_key("dilations") && op.attr_ints("dilations")?.iter().any(|&d| d != 1) {
        return Err(ConvertError::unsupported_config(
            &op.op_type,
            format!("dilations {:?}", op.attr_ints("dilations")?),
        ));
    }

    // 3x3 stride-2 with unit padding is padded explicitly, then run valid.
    let explicit_pad =
        [pad_h, pad_w] == [1, 1] && [stride_h, stride_w] == [2, 2] && (kh, kw) == (3, 3);

    let padding = if explicit_pad {
        Padding::Valid
    } else if pad_h != pad_w {
        return Err(ConvertError::unsupported_config(
            &op.op_type,
            format!("asymmetric paddings [{}, {}]", pad_h, pad_w),
        ));
    } else {
        match pad_h {
            0 => Padding::Valid,
            1 => Padding::Same,
            p => {
                return Err(ConvertError::unsupported_config(
                    &op.op_type,
                    format!("padding {}", p),
                ))
            }
        }
    };

    let depthwise = if groups == 1 {
        false
    } else if usize::try_from(groups).is_ok_and(|g| g == out_channels) {
        true
    } else {
        return Err(ConvertError::unsupported_config(
            &op.op_type,
            format!("groups {} with {} output channels", groups, out_channels),
        ));
    };

    let weights = r.load_weights(filter, &filter_shape)?;
    let make_params = |weights: DenseTensor<f32>| Conv2dParams {
        weights,
        bias: None,
        padding,
        stride_h,
        stride_w,
    };
    let layer = if depthwise {
        Layer::DepthwiseConv2d(make_params(weights.swap_leading_axes()))
    } else {
        Layer::Conv2d(make_params(weights))
    };

    let in_shape = r.var_shape(input)?;
    let out_shape = r.var_shape(output)?;

    if explicit_pad {
        let pad = SpaceToBatchParams {
            block_shape: [1, 1],
            paddings: [[1, 1], [1, 1]],
        };
        let padded = pad.output_shape(&in_shape);
        let label = format!("{}.space_to_batch", output);
        let pad_node = r.add_node(
            Layer::SpaceToBatch(pad),
            &label,
            vec![in_shape],
            vec![padded.clone()],
        )?;
        let conv = r.add_node(layer, output, vec![padded], vec![out_shape])?;
        r.connect(OutputRef::new(pad_node, 0), InputRef::new(conv, 0))?;
        r.consume(pad_node, 0, input, index);
        r.produce(output, conv, 0, index);
    } else {
        let conv = r.add_node(layer, output, vec![in_shape], vec![out_shape])?;
        r.consume(conv, 0, input, index);
        r.produce(output, conv, 0, index);
    }
    Ok(())
}
