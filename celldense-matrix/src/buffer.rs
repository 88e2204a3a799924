//! A growable buffer holding exactly one of the six storage element types.

use half::bf16;

use crate::element::{Element, ElementType, Scalar};

/// Read-only visitor over the active typed slice.
pub trait BufferVisitor {
    type Output;
    fn visit<T: Element>(self, values: &[T]) -> Self::Output;
}

/// Mutable visitor over the active typed slice.
pub trait BufferVisitorMut {
    type Output;
    fn visit<T: Element>(self, values: &mut [T]) -> Self::Output;
}

/// Tagged union over the dense storage vectors. Only the active alternative
/// holds data.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedBuffer {
    Float32(Vec<f32>),
    BFloat16(Vec<bf16>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
}

macro_rules! each_variant {
    ($buf:expr, $v:ident => $body:expr) => {
        match $buf {
            TypedBuffer::Float32($v) => $body,
            TypedBuffer::BFloat16($v) => $body,
            TypedBuffer::Int16($v) => $body,
            TypedBuffer::UInt16($v) => $body,
            TypedBuffer::Int8($v) => $body,
            TypedBuffer::UInt8($v) => $body,
        }
    };
}

impl Default for TypedBuffer {
    fn default() -> Self {
        TypedBuffer::Float32(Vec::new())
    }
}

impl TypedBuffer {
    /// An empty buffer of the given type.
    pub fn new(element_type: ElementType) -> Self {
        Self::zeroed(element_type, 0)
    }

    /// A zero-filled buffer of `len` elements.
    pub fn zeroed(element_type: ElementType, len: usize) -> Self {
        match element_type {
            ElementType::Float32 => TypedBuffer::Float32(vec![0.0; len]),
            ElementType::BFloat16 => TypedBuffer::BFloat16(vec![bf16::ZERO; len]),
            ElementType::Int16 => TypedBuffer::Int16(vec![0; len]),
            ElementType::UInt16 => TypedBuffer::UInt16(vec![0; len]),
            ElementType::Int8 => TypedBuffer::Int8(vec![0; len]),
            ElementType::UInt8 => TypedBuffer::UInt8(vec![0; len]),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            TypedBuffer::Float32(_) => ElementType::Float32,
            TypedBuffer::BFloat16(_) => ElementType::BFloat16,
            TypedBuffer::Int16(_) => ElementType::Int16,
            TypedBuffer::UInt16(_) => ElementType::UInt16,
            TypedBuffer::Int8(_) => ElementType::Int8,
            TypedBuffer::UInt8(_) => ElementType::UInt8,
        }
    }

    /// Switch the active type. Contents are discarded only if the type
    /// actually changes.
    pub fn set_element_type(&mut self, element_type: ElementType) {
        if self.element_type() != element_type {
            *self = Self::new(element_type);
        }
    }

    pub fn len(&self) -> usize {
        each_variant!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resize the active vector, zero-filling new elements.
    pub fn resize(&mut self, len: usize) {
        each_variant!(self, v => v.resize(len, Default::default()))
    }

    pub fn clear(&mut self) {
        each_variant!(self, v => v.clear())
    }

    pub fn shrink_to_fit(&mut self) {
        each_variant!(self, v => v.shrink_to_fit())
    }

    /// Heap bytes occupied by the active elements.
    pub fn memory_bytes(&self) -> usize {
        self.len() * self.element_type().size_bytes()
    }

    /// Call `visitor` with the active slice and forward its result.
    pub fn visit<V: BufferVisitor>(&self, visitor: V) -> V::Output {
        each_variant!(self, v => visitor.visit(v.as_slice()))
    }

    /// Call `visitor` with the active slice as a writable cursor.
    pub fn visit_mut<V: BufferVisitorMut>(&mut self, visitor: V) -> V::Output {
        each_variant!(self, v => visitor.visit(v.as_mut_slice()))
    }

    /// Replace the contents with `source`, converted element by element into
    /// the active type.
    pub fn convert_from<S: Scalar>(&mut self, source: &[S]) {
        each_variant!(self, v => refill(v, source))
    }

    /// The active slice as `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not the active element type.
    pub fn as_slice<T: Element>(&self) -> &[T] {
        match T::slice_of(self) {
            Some(s) => s,
            None => panic!(
                "typed buffer holds {}, requested {}",
                self.element_type(),
                T::TYPE
            ),
        }
    }

    /// Mutable counterpart of [`as_slice`](Self::as_slice).
    ///
    /// # Panics
    ///
    /// Panics if `T` is not the active element type.
    pub fn as_mut_slice<T: Element>(&mut self) -> &mut [T] {
        let active = self.element_type();
        match T::slice_of_mut(self) {
            Some(s) => s,
            None => panic!("typed buffer holds {active}, requested {}", T::TYPE),
        }
    }

    pub fn try_as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice_of(self)
    }

    pub fn try_as_mut_slice<T: Element>(&mut self) -> Option<&mut [T]> {
        T::slice_of_mut(self)
    }

    /// Element `index` widened to `f64`.
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        each_variant!(self, v => v.get(index).map(|x| x.to_f64()))
    }

    /// Copy of the contents widened to `f32`.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        each_variant!(self, v => v.iter().map(|x| x.to_f64() as f32).collect())
    }
}

fn refill<T: Element, S: Scalar>(dest: &mut Vec<T>, source: &[S]) {
    dest.clear();
    dest.extend(source.iter().map(|&s| T::from_f64(s.to_f64())));
}
