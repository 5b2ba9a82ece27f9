//! # Aggregate
//!
//! Struct descriptors for aggregate arguments
//!
//! A [`StructLayout`] describes the C layout of a struct: where each field lives and what it holds.
//! Layouts are computed by [`StructBuilder`] following the usual C rules (natural alignment,
//! optionally capped by a pack value, trailing padding up to the struct's alignment).

use std::ffi::c_long;
use std::mem;

pub mod classify;

/// Scalar field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// `bool`
    Bool,
    /// `char`
    Char,
    /// `short`
    Short,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `long long`
    LongLong,
    /// `float`
    Float,
    /// `double`
    Double,
    /// Any data pointer
    Pointer,
}

/// Register class a scalar field belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarClass {
    /// General purpose registers
    Integer,
    /// Vector registers
    Float,
}

impl FieldType {
    /// Size in bytes
    pub fn size(self) -> usize {
        match self {
            Self::Bool | Self::Char => 1,
            Self::Short => 2,
            Self::Int | Self::Float => 4,
            Self::Long => mem::size_of::<c_long>(),
            Self::LongLong | Self::Double | Self::Pointer => 8,
        }
    }

    /// Natural alignment in bytes
    pub fn align(self) -> usize {
        // every x64 scalar is aligned to its size
        self.size()
    }

    /// Register class the ABI assigns this type to
    pub fn class(self) -> ScalarClass {
        match self {
            Self::Float | Self::Double => ScalarClass::Float,
            _ => ScalarClass::Integer,
        }
    }
}

/// What a field holds
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// A scalar value
    Scalar(FieldType),
    /// A nested struct
    Struct(StructLayout),
}

impl FieldKind {
    /// Size of one element
    fn size(&self) -> usize {
        match self {
            Self::Scalar(ty) => ty.size(),
            Self::Struct(layout) => layout.size,
        }
    }

    /// Alignment of one element
    fn align(&self) -> usize {
        match self {
            Self::Scalar(ty) => ty.align(),
            Self::Struct(layout) => layout.alignment,
        }
    }
}

/// One field of a struct. Arrays are fields with a count above one.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Byte offset from the start of the struct
    pub offset: usize,
    /// Element type
    pub kind: FieldKind,
    /// Number of consecutive elements
    pub count: usize,
}

/// C layout of a struct argument
#[derive(Debug, Clone, PartialEq)]
pub struct StructLayout {
    /// Total size including trailing padding
    size: usize,
    /// Alignment of the struct as a whole
    alignment: usize,
    /// Fields in declaration order
    fields: Vec<Field>,
}

impl StructLayout {
    /// Starts describing a new struct
    pub fn builder() -> StructBuilder {
        StructBuilder::default()
    }

    /// Total size in bytes, including trailing padding
    pub fn size(&self) -> usize {
        self.size
    }

    /// Alignment in bytes
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Visits every scalar of the struct with its absolute offset, flattening arrays and nested structs
    pub fn for_each_scalar(&self, visit: &mut dyn FnMut(usize, FieldType)) {
        self.visit_scalars(0, visit);
    }

    /// Recursive part of [`for_each_scalar`](Self::for_each_scalar)
    fn visit_scalars(&self, base: usize, visit: &mut dyn FnMut(usize, FieldType)) {
        for field in &self.fields {
            let stride = field.kind.size();
            for i in 0..field.count {
                let offset = base + field.offset + i * stride;
                match &field.kind {
                    FieldKind::Scalar(ty) => visit(offset, *ty),
                    FieldKind::Struct(layout) => layout.visit_scalars(offset, visit),
                }
            }
        }
    }
}

/// Builder computing a [`StructLayout`]
#[derive(Debug, Clone, Default)]
pub struct StructBuilder {
    /// Fields added so far, with their element counts
    fields: Vec<(FieldKind, usize)>,
    /// Maximum alignment of any field, if packed
    pack: Option<usize>,
}

impl StructBuilder {
    /// Adds a scalar field, or an array of `count` scalars
    pub fn field(mut self, ty: FieldType, count: usize) -> Self {
        self.fields.push((FieldKind::Scalar(ty), count));
        self
    }

    /// Adds a nested struct field, or an array of `count` structs
    pub fn sub_struct(mut self, layout: StructLayout, count: usize) -> Self {
        self.fields.push((FieldKind::Struct(layout), count));
        self
    }

    /// Caps field alignment like `#pragma pack(n)`
    pub fn pack(mut self, pack: usize) -> Self {
        self.pack = Some(pack.max(1));
        self
    }

    /// Lays out the fields
    pub fn build(self) -> StructLayout {
        let mut offset = 0;
        let mut alignment = 1;
        let mut fields = Vec::with_capacity(self.fields.len());

        for (kind, count) in self.fields {
            let align = match self.pack {
                Some(pack) => kind.align().min(pack),
                None => kind.align(),
            };
            offset = align_up(offset, align);
            alignment = alignment.max(align);

            let size = kind.size() * count;
            fields.push(Field {
                offset,
                kind,
                count,
            });
            offset += size;
        }

        StructLayout {
            size: align_up(offset, alignment),
            alignment,
            fields,
        }
    }
}

/// Rounds `value` up to a multiple of `align`
fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) / align * align
}
