//! Wire-format encoders for the scene content an `RtCore` fetches: ray
//! geometry and triangle payloads. Node/header encoding is already public
//! on `arches_core::rt::treelet`, so only the two formats it doesn't
//! expose an encoder for live here.

use arches_core::rt::Ray;

/// Encodes a ray the way `RtCore::on_ray_return` expects it: origin (3
/// floats), direction (3 floats), `t_min`, `t_max`, 32 bytes total.
pub fn encode_ray(ray: &Ray) -> [u8; 32] {
    let mut buf = [0u8; 32];
    let put = |buf: &mut [u8; 32], off: usize, v: f32| buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
    put(&mut buf, 0, ray.origin[0]);
    put(&mut buf, 4, ray.origin[1]);
    put(&mut buf, 8, ray.origin[2]);
    put(&mut buf, 12, ray.dir[0]);
    put(&mut buf, 16, ray.dir[1]);
    put(&mut buf, 20, ray.dir[2]);
    put(&mut buf, 24, ray.t_min);
    put(&mut buf, 28, ray.t_max);
    buf
}

/// Encodes a triangle the way `RtCore`'s internal `decode_triangle` reads
/// it back: three vertices then a `u32` id, 40 bytes total.
pub fn encode_triangle(v0: [f32; 3], v1: [f32; 3], v2: [f32; 3], id: u32) -> [u8; 40] {
    let mut buf = [0u8; 40];
    let put = |buf: &mut [u8; 40], off: usize, v: f32| buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
    for (i, c) in v0.iter().enumerate() {
        put(&mut buf, i * 4, *c);
    }
    for (i, c) in v1.iter().enumerate() {
        put(&mut buf, 12 + i * 4, *c);
    }
    for (i, c) in v2.iter().enumerate() {
        put(&mut buf, 24 + i * 4, *c);
    }
    buf[36..40].copy_from_slice(&id.to_le_bytes());
    buf
}
