use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;
use bytemuck::NoUninit;

#[repr(C)]
#[derive(Debug, Clone, Copy, NoUninit)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 4],
    pub uv: [f32; 2],
}

const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

pub struct MeshBuffer {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Append `other` with its vertices transformed by `transform`
    pub fn append_transformed(&mut self, other: &Mesh, transform: Mat4) {
        let base = self.vertices.len() as u32;
        let normal_mat = transform.inverse().transpose();
        for v in &other.vertices {
            let p = transform.transform_point3(Vec3::from(v.pos));
            let n = normal_mat.transform_vector3(Vec3::from(v.normal)).normalize_or_zero();
            self.vertices.push(Vertex { pos: p.to_array(), normal: n.to_array(), ..*v });
        }
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    pub fn upload(&self, device: &wgpu::Device) -> MeshBuffer {

        let vertices = bytemuck::cast_slice(&self.vertices);
        let indices = bytemuck::cast_slice(&self.indices);

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: vertices,
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Index Buffer"),
            contents: indices,
            usage: wgpu::BufferUsages::INDEX,
        });

        MeshBuffer {
            vertex_buffer,
            index_buffer,
            index_count: self.indices.len() as u32,
        }
    }
}

/// Axis-aligned box centered at the origin
pub fn create_box_mesh(half: Vec3) -> Mesh {
    // (normal, u axis, v axis) per face
    let faces = [
        (Vec3::X, Vec3::Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::X, Vec3::Y),
    ];

    let mut mesh = Mesh::empty();
    for (n, u, v) in faces {
        let base = mesh.vertices.len() as u32;
        let center = n * half;
        let du = u * half;
        let dv = v * half;
        let corners = [
            (center - du - dv, [0.0, 0.0]),
            (center + du - dv, [1.0, 0.0]),
            (center + du + dv, [1.0, 1.0]),
            (center - du + dv, [0.0, 1.0]),
        ];
        for (p, uv) in corners {
            mesh.vertices.push(Vertex { pos: p.to_array(), normal: n.to_array(), color: WHITE, uv });
        }
        // counter-clockwise seen from outside when u x v == n
        if u.cross(v).dot(n) > 0.0 {
            mesh.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        } else {
            mesh.indices.extend_from_slice(&[base, base + 2, base + 1, base, base + 3, base + 2]);
        }
    }
    mesh
}

/// UV sphere centered at the origin
pub fn create_sphere_mesh(radius: f32, segments: u32, rings: u32) -> Mesh {
    let mut mesh = Mesh::empty();
    for r in 0..=rings {
        let phi = std::f32::consts::PI * r as f32 / rings as f32;
        for s in 0..=segments {
            let theta = std::f32::consts::TAU * s as f32 / segments as f32;
            let n = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
            mesh.vertices.push(Vertex {
                pos: (n * radius).to_array(),
                normal: n.to_array(),
                color: WHITE,
                uv: [s as f32 / segments as f32, r as f32 / rings as f32],
            });
        }
    }
    let stride = segments + 1;
    for r in 0..rings {
        for s in 0..segments {
            let a = r * stride + s;
            let b = a + stride;
            mesh.indices.extend_from_slice(&[a, a + 1, b, a + 1, b + 1, b]);
        }
    }
    mesh
}

/// Capped cylinder (or frustum) along Y, centered at the origin
pub fn create_cylinder_mesh(radius_top: f32, radius_bottom: f32, height: f32, segments: u32) -> Mesh {
    let mut mesh = Mesh::empty();
    let half = height / 2.0;
    let slope = (radius_bottom - radius_top) / height;

    // side
    for s in 0..=segments {
        let theta = std::f32::consts::TAU * s as f32 / segments as f32;
        let (sin, cos) = theta.sin_cos();
        let n = Vec3::new(cos, slope, sin).normalize();
        let u = s as f32 / segments as f32;
        mesh.vertices.push(Vertex { pos: [radius_top * cos, half, radius_top * sin], normal: n.to_array(), color: WHITE, uv: [u, 1.0] });
        mesh.vertices.push(Vertex { pos: [radius_bottom * cos, -half, radius_bottom * sin], normal: n.to_array(), color: WHITE, uv: [u, 0.0] });
    }
    for s in 0..segments {
        let a = s * 2;
        mesh.indices.extend_from_slice(&[a, a + 2, a + 1, a + 1, a + 2, a + 3]);
    }

    // caps
    for (y, radius, normal) in [(half, radius_top, Vec3::Y), (-half, radius_bottom, Vec3::NEG_Y)] {
        let center = mesh.vertices.len() as u32;
        mesh.vertices.push(Vertex { pos: [0.0, y, 0.0], normal: normal.to_array(), color: WHITE, uv: [0.5, 0.5] });
        for s in 0..=segments {
            let theta = std::f32::consts::TAU * s as f32 / segments as f32;
            let (sin, cos) = theta.sin_cos();
            mesh.vertices.push(Vertex {
                pos: [radius * cos, y, radius * sin],
                normal: normal.to_array(),
                color: WHITE,
                uv: [0.5 + cos * 0.5, 0.5 + sin * 0.5],
            });
        }
        for s in 0..segments {
            let a = center + 1 + s;
            if normal.y > 0.0 {
                mesh.indices.extend_from_slice(&[center, a + 1, a]);
            } else {
                mesh.indices.extend_from_slice(&[center, a, a + 1]);
            }
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_normal(mesh: &Mesh, tri: usize) -> Vec3 {
        let i = &mesh.indices[tri * 3..tri * 3 + 3];
        let a = Vec3::from(mesh.vertices[i[0] as usize].pos);
        let b = Vec3::from(mesh.vertices[i[1] as usize].pos);
        let c = Vec3::from(mesh.vertices[i[2] as usize].pos);
        (b - a).cross(c - a).normalize()
    }

    #[test]
    fn test_box_triangles_wind_outward() {
        let mesh = create_box_mesh(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(mesh.indices.len(), 36);
        for tri in 0..12 {
            let n = face_normal(&mesh, tri);
            let stored = Vec3::from(mesh.vertices[mesh.indices[tri * 3] as usize].normal);
            assert!(n.dot(stored) > 0.99, "triangle {} winds inward", tri);
        }
    }

    #[test]
    fn test_sphere_vertices_lie_on_radius() {
        let mesh = create_sphere_mesh(2.5, 12, 8);
        for v in &mesh.vertices {
            let len = Vec3::from(v.pos).length();
            assert!((len - 2.5).abs() < 1e-4, "vertex off sphere: {}", len);
        }
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn test_append_transformed_offsets_indices() {
        let cube = create_box_mesh(Vec3::ONE);
        let mut merged = Mesh::empty();
        merged.append_transformed(&cube, Mat4::IDENTITY);
        merged.append_transformed(&cube, Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        assert_eq!(merged.vertices.len(), cube.vertices.len() * 2);
        assert_eq!(merged.indices[cube.indices.len()], cube.indices[0] + cube.vertices.len() as u32);
        assert!((merged.vertices[cube.vertices.len()].pos[0] - (cube.vertices[0].pos[0] + 5.0)).abs() < 1e-6);
    }
}
