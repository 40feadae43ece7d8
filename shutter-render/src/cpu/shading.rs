//! Host implementations of the fragment programs in `motion_blur_tiles.wgsl`.

use glam::{Vec2, Vec4, Vec4Swizzles};
use shutter_gpu_shared::uniforms::MotionBlurUniforms;

use super::texture::CpuTexture;

/// Run `shade` once per texel of `target` with the texel-center UV.
pub(crate) fn render_fullscreen(target: &mut CpuTexture, shade: impl Fn(Vec2) -> Vec4) {
    let size = target.size();
    let extent = target.extent();
    let format = target.format();
    let texels = target.texels_mut();
    for y in 0..extent.height {
        for x in 0..extent.width {
            let uv = (Vec2::new(x as f32, y as f32) + 0.5) / size;
            texels[y as usize * extent.width as usize + x as usize] = format.quantize(shade(uv));
        }
    }
}

/// Longer of two vectors; the first wins ties.
pub fn max_v(a: Vec2, b: Vec2) -> Vec2 {
    if a.length_squared() < b.length_squared() {
        b
    } else {
        a
    }
}

fn fract(x: f32) -> f32 {
    x - x.floor()
}

/// Interleaved gradient noise of a pixel position.
pub fn gradient_noise(pixel: Vec2) -> f32 {
    let f = Vec2::new(0.06711056, 0.00583715).dot(pixel);
    fract(52.9829189 * fract(f))
}

fn interval(x: f32, n: f32) -> bool {
    fract(x / n) > 0.499
}

fn unpack_velocity(u: &MotionBlurUniforms, packed: Vec2) -> Vec2 {
    (packed * 2.0 - Vec2::ONE) * u.max_blur_radius
}

/// Velocity in pixels and depth from the packed buffer.
fn sample_velocity(u: &MotionBlurUniforms, velocity: &CpuTexture, uv: Vec2) -> (Vec2, f32) {
    let v = velocity.sample_point(uv);
    (unpack_velocity(u, v.xy()), v.z)
}

pub fn velocity_setup(
    u: &MotionBlurUniforms,
    motion: &CpuTexture,
    depth: Option<&CpuTexture>,
    uv: Vec2,
) -> Vec4 {
    let mut v = motion.sample_point(uv).xy();
    v = v * (u.velocity_scale * 0.5) * motion.size();
    v /= (v.length() * u.rcp_max_blur_radius).max(1.0);
    let d = depth.map_or(1.0, |depth| depth.sample_point(uv).x);
    let packed = (v * u.rcp_max_blur_radius + Vec2::ONE) * 0.5;
    Vec4::new(packed.x, packed.y, d, 0.0)
}

fn diagonal_max(source: &CpuTexture, uv: Vec2, read: impl Fn(Vec4) -> Vec2) -> Vec4 {
    let d = source.texel_size() * 0.5;
    let v1 = read(source.sample_point(uv + Vec2::new(-d.x, -d.y)));
    let v2 = read(source.sample_point(uv + Vec2::new(d.x, -d.y)));
    let v3 = read(source.sample_point(uv + Vec2::new(-d.x, d.y)));
    let v4 = read(source.sample_point(uv + Vec2::new(d.x, d.y)));
    max_v(max_v(max_v(v1, v2), v3), v4).extend(0.0).extend(0.0)
}

pub fn tile_max1(u: &MotionBlurUniforms, source: &CpuTexture, uv: Vec2) -> Vec4 {
    diagonal_max(source, uv, |texel| unpack_velocity(u, texel.xy()))
}

pub fn tile_max2(source: &CpuTexture, uv: Vec2) -> Vec4 {
    diagonal_max(source, uv, |texel| texel.xy())
}

pub fn tile_max_v(u: &MotionBlurUniforms, source: &CpuTexture, uv: Vec2) -> Vec4 {
    let texel = source.texel_size();
    let uv0 = uv + texel * Vec2::from_array(u.tile_max_offset);
    let mut vo = Vec2::ZERO;
    for ix in 0..u.tile_max_loop {
        for iy in 0..u.tile_max_loop {
            let uv = uv0 + texel * Vec2::new(ix as f32, iy as f32);
            vo = max_v(vo, source.sample_point(uv).xy());
        }
    }
    vo.extend(0.0).extend(0.0)
}

pub fn neighbor_max(source: &CpuTexture, uv: Vec2) -> Vec4 {
    let texel = source.texel_size();
    let mut vo = source.sample_point(uv).xy();
    for dy in -1..=1 {
        for dx in -1..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let uv = uv + texel * Vec2::new(dx as f32, dy as f32);
            vo = max_v(vo, source.sample_point(uv).xy());
        }
    }
    vo.extend(0.0).extend(0.0)
}

pub fn reconstruction(
    u: &MotionBlurUniforms,
    color: &CpuTexture,
    velocity: &CpuTexture,
    neighbor_max: &CpuTexture,
    uv: Vec2,
) -> Vec4 {
    let size = color.size();
    let texel = size.recip();

    let c_p = color.sample_point(uv);
    let (v_p, d_p) = sample_velocity(u, velocity, uv);
    let l_v_p = v_p.length().max(0.5);
    let rcp_d_p = 1.0 / d_p.max(1e-4);

    let v_max = neighbor_max.sample_point(uv).xy();
    let l_v_max = v_max.length();
    if l_v_max < 2.0 {
        return c_p;
    }

    let v_alt = if l_v_p * 2.0 > l_v_max {
        v_p * (l_v_max / l_v_p)
    } else {
        v_max
    };

    let sc = (u.loop_count as f32).min(l_v_max * 0.5).floor();
    let dt = 1.0 / sc;
    let t_offs = (gradient_noise(uv * size) - 0.5) * dt;
    let mut t = 1.0 - dt * 0.5;
    let mut count = 0.0f32;
    let mut l_v_bg = l_v_p.max(1.0);
    let mut acc = Vec4::ZERO;

    while t > dt * 0.25 {
        let v_s = if interval(count, 4.0) { v_alt } else { v_max };
        let t_s = (if interval(count, 2.0) { -t } else { t }) + t_offs;
        let l_t = l_v_max * t_s.abs();
        let uv_s = uv + v_s * t_s * texel;

        let c = color.sample(uv_s).xyz();
        let (v, d) = sample_velocity(u, velocity, uv_s);

        let fg = ((d_p - d) * 20.0 * rcp_d_p).clamp(0.0, 1.0);
        let l_v = l_v_bg + (v.length() - l_v_bg) * fg;
        let w = (l_v - l_t).clamp(0.0, 1.0) / l_v * (1.2 - t);

        acc += c.extend(1.0) * w;
        l_v_bg = l_v_bg.max(l_v);
        if interval(count, 2.0) {
            t -= dt;
        }
        count += 1.0;
    }

    acc += c_p.xyz().extend(1.0) * (1.2 / (l_v_bg * sc * 2.0));
    (acc.xyz() / acc.w).extend(c_p.w)
}
