use crate::compile::UniformKind;

/// A value written into a program's uniform block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec4([f32; 4]),
    Mat4([[f32; 4]; 4]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            UniformValue::Int(value) => bytemuck::bytes_of(value),
            UniformValue::Float(value) => bytemuck::bytes_of(value),
            UniformValue::Vec2(value) => bytemuck::bytes_of(value),
            UniformValue::Vec4(value) => bytemuck::bytes_of(value),
            UniformValue::Mat4(value) => bytemuck::bytes_of(value),
        }
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(value: [f32; 2]) -> Self {
        UniformValue::Vec2(value)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(value: [f32; 4]) -> Self {
        UniformValue::Vec4(value)
    }
}

impl From<glam::Mat4> for UniformValue {
    fn from(value: glam::Mat4) -> Self {
        UniformValue::Mat4(value.to_cols_array_2d())
    }
}

/// CPU-side copy of a std140 uniform block, uploaded when dirty.
#[derive(Debug)]
pub(crate) struct UniformStorage {
    data: Vec<u8>,
    dirty: bool,
}

impl UniformStorage {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
            dirty: size > 0,
        }
    }

    /// Writes `value` at `offset`. Returns false when it would overrun the
    /// block.
    pub fn write(&mut self, offset: u32, value: &UniformValue) -> bool {
        let bytes = value.bytes();
        let start = offset as usize;
        let Some(slot) = self.data.get_mut(start..start + bytes.len()) else {
            return false;
        };
        if slot != bytes {
            slot.copy_from_slice(bytes);
            self.dirty = true;
        }
        true
    }

    pub fn take_dirty(&mut self) -> Option<&[u8]> {
        if self.dirty {
            self.dirty = false;
            Some(&self.data)
        } else {
            None
        }
    }

    #[cfg(test)]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_land_at_reflected_offsets() {
        let mut storage = UniformStorage::new(16);
        assert!(storage.write(0, &UniformValue::Vec2([0.25, 0.5])));
        assert!(storage.write(8, &UniformValue::Int(3)));
        let bytes = storage.bytes();
        assert_eq!(&bytes[0..4], &0.25f32.to_ne_bytes());
        assert_eq!(&bytes[4..8], &0.5f32.to_ne_bytes());
        assert_eq!(&bytes[8..12], &3i32.to_ne_bytes());
    }

    #[test]
    fn overruns_are_rejected() {
        let mut storage = UniformStorage::new(16);
        assert!(!storage.write(8, &UniformValue::Vec4([1.0; 4])));
        assert!(!storage.write(64, &UniformValue::Float(1.0)));
    }

    #[test]
    fn unchanged_writes_do_not_dirty_the_block() {
        let mut storage = UniformStorage::new(16);
        assert!(storage.take_dirty().is_some());
        storage.write(4, &UniformValue::Float(0.0));
        assert!(storage.take_dirty().is_none());
        storage.write(4, &UniformValue::Float(1.0));
        assert!(storage.take_dirty().is_some());
    }

    #[test]
    fn matrices_are_column_major() {
        let matrix = glam::Mat4::from_translation(glam::Vec3::new(2.0, 3.0, 4.0));
        let UniformValue::Mat4(columns) = UniformValue::from(matrix) else {
            panic!("expected a matrix");
        };
        assert_eq!(columns[3], [2.0, 3.0, 4.0, 1.0]);
    }
}
