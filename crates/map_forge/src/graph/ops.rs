//! Built-in operators.
//!
//! These are small deterministic stand-ins for the terrain heuristics: layered value noise,
//! box blur, finite-difference slope and normals, a horizon sweep for shadows, thresholds and
//! boolean algebra, and marker scattering backed by [`crate::sampling`]. All randomness comes
//! from [`OpContext::rng`].
use std::ops::RangeInclusive;

use glam::{Vec3, Vec4};
use mint::Vector2;
use rand::RngCore;

use crate::error::{Error, Result};
use crate::graph::registry::{OpContext, Operator, OperatorRegistry};
use crate::graph::spec::PORT;
use crate::mask::{BooleanMask, FloatMask, MapMask, MaskKind, Vector4Mask};
use crate::sampling::{cell_of, rand01, JitterGridSampling, PoissonDiskSampling, PointSampling};

type ApplyFn = fn(&OpContext, &mut MapMask, Vec<MapMask>) -> Result<()>;

/// Accepted input count and kinds of an operator.
#[derive(Clone, Debug)]
struct Signature {
    arity: RangeInclusive<usize>,
    input: MaskKind,
    output: MaskKind,
}

impl Signature {
    fn new(arity: RangeInclusive<usize>, input: MaskKind, output: MaskKind) -> Self {
        Self {
            arity,
            input,
            output,
        }
    }

    fn check(&self, inputs: &[MaskKind], output: MaskKind) -> std::result::Result<(), String> {
        if !self.arity.contains(&inputs.len()) {
            return Err(format!(
                "expects {}..={} inputs but found {}",
                self.arity.start(),
                self.arity.end(),
                inputs.len()
            ));
        }
        if let Some(kind) = inputs.iter().find(|k| **k != self.input) {
            return Err(format!(
                "expects {:?} inputs but found {:?}",
                self.input, kind
            ));
        }
        if output != self.output {
            return Err(format!(
                "writes a {:?} mask but the vertex is {:?}",
                self.output, output
            ));
        }
        Ok(())
    }
}

/// Operator backed by a plain function.
struct FnOperator {
    signature: Signature,
    apply: ApplyFn,
}

impl Operator for FnOperator {
    fn check(&self, inputs: &[MaskKind], output: MaskKind) -> std::result::Result<(), String> {
        self.signature.check(inputs, output)
    }

    fn apply(&self, ctx: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()> {
        (self.apply)(ctx, target, inputs)
    }
}

/// Endpoint vertex: keeps a bound value, or copies its single producer.
struct Port;

impl Operator for Port {
    fn check(&self, inputs: &[MaskKind], output: MaskKind) -> std::result::Result<(), String> {
        match inputs {
            [] => Ok(()),
            [kind] if *kind == output => Ok(()),
            [kind] => Err(format!(
                "port of kind {:?} cannot carry a {:?} producer",
                output, kind
            )),
            _ => Err(format!("port takes at most one producer, found {}", inputs.len())),
        }
    }

    fn apply(&self, _: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()> {
        if let Some(value) = inputs.into_iter().next() {
            *target = value;
        }
        Ok(())
    }
}

pub(crate) fn register_builtins(registry: &mut OperatorRegistry) {
    use MaskKind::{Boolean, Float, Vector4};

    let builtins: [(&str, Signature, ApplyFn); 18] = [
        ("noise", Signature::new(0..=0, Float, Float), noise),
        ("smooth", Signature::new(1..=1, Float, Float), smooth),
        ("add", Signature::new(1..=usize::MAX, Float, Float), add),
        ("multiply", Signature::new(1..=usize::MAX, Float, Float), multiply),
        ("scale", Signature::new(1..=1, Float, Float), scale),
        ("normalize", Signature::new(1..=1, Float, Float), normalize),
        ("one_minus", Signature::new(1..=1, Float, Float), one_minus),
        ("slope", Signature::new(1..=1, Float, Float), slope),
        ("threshold", Signature::new(1..=1, Float, Boolean), threshold),
        ("invert", Signature::new(1..=1, Boolean, Boolean), invert),
        ("and", Signature::new(1..=usize::MAX, Boolean, Boolean), and),
        ("and_not", Signature::new(2..=2, Boolean, Boolean), and_not),
        ("erode", Signature::new(1..=1, Boolean, Boolean), erode),
        ("normal", Signature::new(1..=1, Float, Vector4), normal),
        ("shadow", Signature::new(1..=1, Float, Float), shadow),
        ("splat", Signature::new(1..=4, Float, Vector4), splat),
        ("scatter_poisson", Signature::new(1..=1, Boolean, Boolean), scatter_poisson),
        ("scatter_jitter", Signature::new(1..=1, Boolean, Boolean), scatter_jitter),
    ];

    registry.register(PORT, Port);
    for (tag, signature, apply) in builtins {
        registry.register(tag, FnOperator { signature, apply });
    }
}

fn into_float(mask: MapMask) -> Result<FloatMask> {
    match mask {
        MapMask::Float(m) => Ok(m),
        other => Err(Error::MaskKind {
            expected: MaskKind::Float,
            found: other.kind(),
        }),
    }
}

fn into_boolean(mask: MapMask) -> Result<BooleanMask> {
    match mask {
        MapMask::Boolean(m) => Ok(m),
        other => Err(Error::MaskKind {
            expected: MaskKind::Boolean,
            found: other.kind(),
        }),
    }
}

fn first(inputs: Vec<MapMask>) -> Result<(MapMask, std::vec::IntoIter<MapMask>)> {
    let mut iter = inputs.into_iter();
    let head = iter
        .next()
        .ok_or_else(|| Error::Other("operator called without inputs".into()))?;
    Ok((head, iter))
}

fn map_float(
    target: &mut MapMask,
    inputs: Vec<MapMask>,
    f: impl FnOnce(&mut FloatMask),
) -> Result<()> {
    let mut mask = into_float(first(inputs)?.0)?;
    f(&mut mask);
    *target = mask.into();
    Ok(())
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Adds one octave of bilinear value noise with lattice `spacing` to `field`.
fn add_value_noise(field: &mut FloatMask, spacing: f32, amplitude: f32, rng: &mut dyn RngCore) {
    let (w, h) = field.size();
    let cols = (w as f32 / spacing).ceil() as usize + 2;
    let rows = (h as f32 / spacing).ceil() as usize + 2;
    let lattice: Vec<f32> = (0..cols * rows).map(|_| rand01(rng)).collect();
    let fade = |t: f32| t * t * (3.0 - 2.0 * t);

    let data = field.data_mut();
    for y in 0..h {
        let fy = y as f32 / spacing;
        let y0 = fy.floor() as usize;
        let ty = fade(fy - y0 as f32);
        for x in 0..w {
            let fx = x as f32 / spacing;
            let x0 = fx.floor() as usize;
            let tx = fade(fx - x0 as f32);
            let at = |cx: usize, cy: usize| lattice[cy * cols + cx];
            let top = lerp(at(x0, y0), at(x0 + 1, y0), tx);
            let bottom = lerp(at(x0, y0 + 1), at(x0 + 1, y0 + 1), tx);
            data[y * w + x] += amplitude * lerp(top, bottom, ty);
        }
    }
}

fn noise(ctx: &OpContext, target: &mut MapMask, _: Vec<MapMask>) -> Result<()> {
    let (w, h) = target.size();
    let mut rng = ctx.rng();
    let mut field = FloatMask::new(w, h);
    let mut spacing = ctx.param("scale", 16.0).max(1.0);
    let mut amplitude = ctx.param("amplitude", 1.0);
    let persistence = ctx.param("persistence", 0.5);
    let octaves = ctx.param("octaves", 3.0).max(1.0) as usize;
    for _ in 0..octaves {
        add_value_noise(&mut field, spacing, amplitude, &mut rng);
        spacing = (spacing * 0.5).max(1.0);
        amplitude *= persistence;
    }
    *target = field.into();
    Ok(())
}

fn smooth(ctx: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()> {
    let radius = ctx.param("radius", 2.0).max(0.0) as usize;
    map_float(target, inputs, |m| m.blur(radius))
}

fn add(_: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()> {
    let (head, rest) = first(inputs)?;
    let mut sum = into_float(head)?;
    for other in rest {
        sum.add(&into_float(other)?)?;
    }
    *target = sum.into();
    Ok(())
}

fn multiply(_: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()> {
    let (head, rest) = first(inputs)?;
    let mut product = into_float(head)?;
    for other in rest {
        product.multiply(&into_float(other)?)?;
    }
    *target = product.into();
    Ok(())
}

fn scale(ctx: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()> {
    let factor = ctx.param("factor", 1.0);
    let offset = ctx.param("offset", 0.0);
    map_float(target, inputs, |m| {
        m.multiply_scalar(factor);
        m.add_scalar(offset);
    })
}

fn normalize(_: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()> {
    map_float(target, inputs, FloatMask::normalize)
}

fn one_minus(_: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()> {
    map_float(target, inputs, |m| {
        m.multiply_scalar(-1.0);
        m.add_scalar(1.0);
    })
}

fn slope(ctx: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()> {
    let height = into_float(first(inputs)?.0)?;
    let mut slope = height.gradient_magnitude();
    slope.multiply_scalar(ctx.param("scale", 1.0));
    *target = slope.into();
    Ok(())
}

fn threshold(ctx: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()> {
    let field = into_float(first(inputs)?.0)?;
    let min = ctx.param("min", f32::MIN);
    let max = ctx.param("max", f32::MAX);
    *target = BooleanMask::from_range(&field, min, max).into();
    Ok(())
}

fn invert(_: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()> {
    let mut mask = into_boolean(first(inputs)?.0)?;
    mask.invert();
    *target = mask.into();
    Ok(())
}

fn and(_: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()> {
    let (head, rest) = first(inputs)?;
    let mut all = into_boolean(head)?;
    for other in rest {
        all.and(&into_boolean(other)?)?;
    }
    *target = all.into();
    Ok(())
}

fn and_not(_: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()> {
    let (head, mut rest) = first(inputs)?;
    let mut keep = into_boolean(head)?;
    if let Some(cut) = rest.next() {
        keep.and_not(&into_boolean(cut)?)?;
    }
    *target = keep.into();
    Ok(())
}

fn erode(ctx: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()> {
    let mut mask = into_boolean(first(inputs)?.0)?;
    mask.erode(ctx.param("radius", 1.0).max(0.0) as usize);
    *target = mask.into();
    Ok(())
}

fn normal(ctx: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()> {
    let height = into_float(first(inputs)?.0)?;
    let strength = ctx.param("strength", 1.0);
    let (w, h) = height.size();
    let mut normals = Vector4Mask::new(w, h);
    for y in 0..h as isize {
        for x in 0..w as isize {
            let dx = (height.get_clamped(x + 1, y) - height.get_clamped(x - 1, y)) * 0.5;
            let dy = (height.get_clamped(x, y + 1) - height.get_clamped(x, y - 1)) * 0.5;
            let n = Vec3::new(-dx * strength, -dy * strength, 1.0).normalize();
            normals.set(x as usize, y as usize, n.extend(0.0));
        }
    }
    *target = normals.into();
    Ok(())
}

/// Light travels along +x and loses `drop` height per cell; cells below the ray are shadowed.
fn shadow(ctx: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()> {
    let height = into_float(first(inputs)?.0)?;
    let drop = ctx.param("drop", 0.02).max(0.0);
    let (w, h) = height.size();
    let mut shade = FloatMask::new(w, h);
    for y in 0..h {
        let mut ray = f32::NEG_INFINITY;
        for x in 0..w {
            ray -= drop;
            let cell = height.get(x as isize, y as isize);
            if cell < ray {
                shade.set(x, y, 1.0);
            } else {
                ray = cell;
            }
        }
    }
    *target = shade.into();
    Ok(())
}

fn splat(_: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()> {
    let layers = inputs
        .into_iter()
        .map(into_float)
        .collect::<Result<Vec<_>>>()?;
    let (w, h) = layers.first().map(FloatMask::size).unwrap_or(target.size());
    if let Some((base, rest)) = layers.split_first() {
        for layer in rest {
            base.ensure_same_size(layer)?;
        }
    }
    let mut weights = Vector4Mask::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut channels = [0.0f32; 4];
            for (c, layer) in layers.iter().enumerate() {
                channels[c] = layer.get(x as isize, y as isize);
            }
            weights.set(x, y, Vec4::from_array(channels));
        }
    }
    *target = weights.into();
    Ok(())
}

/// Marks sampled cells that are set in the eligibility mask, up to `limit` markers.
fn scatter(
    ctx: &OpContext,
    target: &mut MapMask,
    inputs: Vec<MapMask>,
    sampling: &dyn PointSampling,
) -> Result<()> {
    let eligible = into_boolean(first(inputs)?.0)?;
    let (w, h) = eligible.size();
    let density = ctx.param("density", 1.0);
    let limit = ctx.param("limit", f32::INFINITY);
    let mut rng = ctx.rng();
    let mut markers = BooleanMask::new(w, h);
    let mut placed = 0usize;

    let extent = Vector2 {
        x: w as f32,
        y: h as f32,
    };
    for point in sampling.generate(extent, &mut rng) {
        if placed as f32 >= limit {
            break;
        }
        let Some((x, y)) = cell_of(point, w, h) else {
            continue;
        };
        let roll = rand01(&mut rng);
        if eligible.get(x as isize, y as isize) && roll < density {
            markers.set(x, y, true);
            placed += 1;
        }
    }
    *target = markers.into();
    Ok(())
}

fn scatter_poisson(ctx: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()> {
    let sampling = PoissonDiskSampling::new(ctx.param("radius", 4.0));
    scatter(ctx, target, inputs, &sampling)
}

fn scatter_jitter(ctx: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()> {
    let sampling = JitterGridSampling::new(ctx.param("jitter", 0.5), ctx.param("spacing", 8.0));
    scatter(ctx, target, inputs, &sampling)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::spec::Params;

    fn ctx(seed: u64, params: &[(&str, f32)]) -> OpContext {
        let mut p = Params::new();
        for (name, value) in params {
            p.set(*name, *value);
        }
        OpContext {
            stage: "test".into(),
            vertex: "v".into(),
            seed,
            params: p,
        }
    }

    fn run(tag: &str, ctx: &OpContext, target: MapMask, inputs: Vec<MapMask>) -> MapMask {
        let registry = OperatorRegistry::with_builtins();
        let op = registry.get(tag).expect("built-in");
        let mut target = target;
        op.apply(ctx, &mut target, inputs).expect("operator succeeds");
        target
    }

    fn ramp(w: usize, h: usize) -> FloatMask {
        let mut m = FloatMask::new(w, h);
        for y in 0..h {
            for x in 0..w {
                m.set(x, y, x as f32);
            }
        }
        m
    }

    #[test]
    fn noise_depends_only_on_seed() {
        let empty = MapMask::empty(MaskKind::Float, 24, 16);
        let a = run("noise", &ctx(7, &[]), empty.clone(), vec![]);
        let b = run("noise", &ctx(7, &[]), empty.clone(), vec![]);
        let c = run("noise", &ctx(8, &[]), empty, vec![]);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let (lo, hi) = a.as_float().unwrap().min_max().unwrap();
        assert!(lo >= 0.0 && hi <= 1.75 + 1e-4, "range {lo}..{hi}");
    }

    #[test]
    fn threshold_and_boolean_algebra() {
        let field = ramp(4, 1);
        let high = run(
            "threshold",
            &ctx(0, &[("min", 2.0)]),
            MapMask::empty(MaskKind::Boolean, 4, 1),
            vec![field.clone().into()],
        );
        assert_eq!(high.as_boolean().unwrap().data(), &[false, false, true, true]);

        let middle = run(
            "threshold",
            &ctx(0, &[("min", 1.0), ("max", 2.0)]),
            MapMask::empty(MaskKind::Boolean, 4, 1),
            vec![field.into()],
        );
        let cut = run(
            "and_not",
            &ctx(0, &[]),
            MapMask::empty(MaskKind::Boolean, 4, 1),
            vec![high.clone(), middle.clone()],
        );
        assert_eq!(cut.as_boolean().unwrap().data(), &[false, false, false, true]);

        let both = run(
            "and",
            &ctx(0, &[]),
            MapMask::empty(MaskKind::Boolean, 4, 1),
            vec![high, middle],
        );
        assert_eq!(both.as_boolean().unwrap().count(), 1);
    }

    #[test]
    fn scale_and_one_minus_transform_cells() {
        let scaled = run(
            "scale",
            &ctx(0, &[("factor", 2.0), ("offset", 1.0)]),
            MapMask::empty(MaskKind::Float, 3, 1),
            vec![ramp(3, 1).into()],
        );
        assert_eq!(scaled.as_float().unwrap().data(), &[1.0, 3.0, 5.0]);

        let flipped = run(
            "one_minus",
            &ctx(0, &[]),
            MapMask::empty(MaskKind::Float, 3, 1),
            vec![ramp(3, 1).into()],
        );
        assert_eq!(flipped.as_float().unwrap().data(), &[1.0, 0.0, -1.0]);
    }

    #[test]
    fn shadow_falls_behind_peaks() {
        let mut height = FloatMask::new(5, 1);
        height.set(1, 0, 1.0);
        let shade = run(
            "shadow",
            &ctx(0, &[("drop", 0.25)]),
            MapMask::empty(MaskKind::Float, 5, 1),
            vec![height.into()],
        );
        assert_eq!(shade.as_float().unwrap().data(), &[0.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn normals_of_flat_ground_point_up() {
        let flat = run(
            "normal",
            &ctx(0, &[]),
            MapMask::empty(MaskKind::Vector4, 3, 3),
            vec![FloatMask::filled(3, 3, 0.4).into()],
        );
        assert!(flat
            .as_vector()
            .unwrap()
            .data()
            .iter()
            .all(|n| *n == Vec4::new(0.0, 0.0, 1.0, 0.0)));
    }

    #[test]
    fn splat_packs_layers_into_channels() {
        let packed = run(
            "splat",
            &ctx(0, &[]),
            MapMask::empty(MaskKind::Vector4, 2, 1),
            vec![
                FloatMask::filled(2, 1, 0.25).into(),
                FloatMask::filled(2, 1, 0.5).into(),
            ],
        );
        assert_eq!(
            packed.as_vector().unwrap().get(1, 0),
            Vec4::new(0.25, 0.5, 0.0, 0.0)
        );
    }

    #[test]
    fn scatter_only_marks_eligible_cells() {
        let mut eligible = BooleanMask::new(32, 32);
        for y in 0..32 {
            for x in 0..16 {
                eligible.set(x, y, true);
            }
        }
        let markers = run(
            "scatter_poisson",
            &ctx(3, &[("radius", 3.0)]),
            MapMask::empty(MaskKind::Boolean, 32, 32),
            vec![eligible.clone().into()],
        );
        let markers = markers.as_boolean().unwrap();
        assert!(markers.count() > 0);
        assert!(markers.positions().iter().all(|(x, _)| *x < 16));

        let limited = run(
            "scatter_jitter",
            &ctx(3, &[("spacing", 4.0), ("limit", 5.0)]),
            MapMask::empty(MaskKind::Boolean, 32, 32),
            vec![eligible.into()],
        );
        assert_eq!(limited.as_boolean().unwrap().count(), 5);
    }

    #[test]
    fn signatures_reject_wrong_kinds_and_arity() {
        let registry = OperatorRegistry::with_builtins();
        let add = registry.get("add").unwrap();
        assert!(add.check(&[MaskKind::Float, MaskKind::Float], MaskKind::Float).is_ok());
        assert!(add.check(&[], MaskKind::Float).is_err());
        assert!(add.check(&[MaskKind::Boolean], MaskKind::Float).is_err());
        assert!(add.check(&[MaskKind::Float], MaskKind::Boolean).is_err());

        let port = registry.get(PORT).unwrap();
        assert!(port.check(&[], MaskKind::Vector4).is_ok());
        assert!(port.check(&[MaskKind::Float], MaskKind::Float).is_ok());
        assert!(port.check(&[MaskKind::Float], MaskKind::Boolean).is_err());
    }
}
