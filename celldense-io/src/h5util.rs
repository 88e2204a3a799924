//! Typed reads of HDF5 datasets and attributes.

use std::cell::RefCell;
use std::path::Path;

use hdf5::types::{
    CompoundField, CompoundType, FixedAscii, FixedUnicode, FloatSize, H5Type, IntSize, TypeDescriptor,
    VarLenAscii, VarLenUnicode,
};
use hdf5::{Dataset, File, Group, Location};

use celldense_core::{CellDenseError, Result};
use celldense_matrix::SourceArray;

/// Fixed-length strings up to this many bytes are read through an
/// HDF5 string conversion.
const FIXED_STRING_MAX: usize = 1024;

pub(crate) fn h5err(e: hdf5::Error) -> CellDenseError {
    CellDenseError::Hdf5(e.to_string())
}

/// Open an HDF5 file. A path that cannot be accessed is an I/O error.
pub(crate) fn open_file(path: &Path) -> Result<File> {
    std::fs::metadata(path)?;
    File::open(path).map_err(h5err)
}

fn descriptor(ds: &hdf5::Container) -> Result<TypeDescriptor> {
    ds.dtype().and_then(|t| t.to_descriptor()).map_err(h5err)
}

/// Read a numeric dataset in its stored element type. Numeric types outside
/// the known set are converted to `f64` by the library.
pub(crate) fn read_source_array(ds: &Dataset) -> Result<SourceArray> {
    let array = match descriptor(ds)? {
        TypeDescriptor::Float(FloatSize::U4) => SourceArray::Float32(ds.read_raw().map_err(h5err)?),
        TypeDescriptor::Float(FloatSize::U8) => SourceArray::Float64(ds.read_raw().map_err(h5err)?),
        TypeDescriptor::Integer(IntSize::U1) => SourceArray::Int8(ds.read_raw().map_err(h5err)?),
        TypeDescriptor::Integer(IntSize::U2) => SourceArray::Int16(ds.read_raw().map_err(h5err)?),
        TypeDescriptor::Integer(IntSize::U4) => SourceArray::Int32(ds.read_raw().map_err(h5err)?),
        TypeDescriptor::Integer(IntSize::U8) => SourceArray::Int64(ds.read_raw().map_err(h5err)?),
        TypeDescriptor::Unsigned(IntSize::U1) => SourceArray::UInt8(ds.read_raw().map_err(h5err)?),
        TypeDescriptor::Unsigned(IntSize::U2) => SourceArray::UInt16(ds.read_raw().map_err(h5err)?),
        TypeDescriptor::Unsigned(IntSize::U4) => SourceArray::UInt32(ds.read_raw().map_err(h5err)?),
        TypeDescriptor::Unsigned(IntSize::U8) => SourceArray::UInt64(ds.read_raw().map_err(h5err)?),
        _ => SourceArray::Float64(ds.read_raw::<f64>().map_err(|e| {
            CellDenseError::Parse(format!("dataset {} is not numeric: {e}", ds.name()))
        })?),
    };
    Ok(array)
}

/// Read an index or offset array as `i64`.
pub(crate) fn read_indices(group: &Group, name: &str) -> Result<Vec<i64>> {
    group
        .dataset(name)
        .and_then(|ds| ds.read_raw::<i64>())
        .map_err(h5err)
}

/// Whether the dataset holds strings of any HDF5 flavour.
pub(crate) fn is_string_dataset(ds: &Dataset) -> bool {
    matches!(
        descriptor(ds),
        Ok(TypeDescriptor::VarLenUnicode
            | TypeDescriptor::VarLenAscii
            | TypeDescriptor::FixedAscii(_)
            | TypeDescriptor::FixedUnicode(_))
    )
}

/// Read a string dataset. Surrounding double quotes are stripped.
pub(crate) fn read_strings(ds: &Dataset) -> Result<Vec<String>> {
    let strings: Vec<String> = match descriptor(ds)? {
        TypeDescriptor::VarLenUnicode => ds
            .read_raw::<VarLenUnicode>()
            .map_err(h5err)?
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
        TypeDescriptor::VarLenAscii => ds
            .read_raw::<VarLenAscii>()
            .map_err(h5err)?
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
        TypeDescriptor::FixedAscii(n) if n <= FIXED_STRING_MAX => ds
            .read_raw::<FixedAscii<FIXED_STRING_MAX>>()
            .map_err(h5err)?
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
        TypeDescriptor::FixedUnicode(n) if n <= FIXED_STRING_MAX => ds
            .read_raw::<FixedUnicode<FIXED_STRING_MAX>>()
            .map_err(h5err)?
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
        other => {
            return Err(CellDenseError::Parse(format!(
                "dataset {} holds {other:?}, expected strings",
                ds.name()
            )))
        }
    };
    Ok(strings.into_iter().map(strip_quotes).collect())
}

/// Read strings from the first of `names` that exists in `group`.
pub(crate) fn read_strings_from_any(group: &Group, names: &[&str]) -> Result<Vec<String>> {
    for name in names {
        if group.link_exists(name) {
            let ds = group.dataset(name).map_err(h5err)?;
            return read_strings(&ds);
        }
    }
    Err(CellDenseError::Parse(format!(
        "none of {names:?} found in {}",
        group.name()
    )))
}

/// Fields of a compound dataset with their stored types, or `None` when the
/// dataset is not compound.
pub(crate) fn compound_fields(ds: &Dataset) -> Option<Vec<(String, TypeDescriptor)>> {
    match descriptor(ds).ok()? {
        TypeDescriptor::Compound(compound) => Some(
            compound
                .fields
                .into_iter()
                .map(|field| (field.name, field.ty))
                .collect(),
        ),
        _ => None,
    }
}

/// Decoded values of a compound field.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldValues {
    Strings(Vec<String>),
    Numbers(Vec<f64>),
}

/// Values of one field of a compound dataset: `Ok(None)` when the field is
/// neither text nor a number.
pub(crate) fn read_compound_field(
    ds: &Dataset,
    field: &str,
    ty: &TypeDescriptor,
) -> Result<Option<FieldValues>> {
    let strings: Vec<String> = match ty {
        TypeDescriptor::VarLenUnicode => read_member::<VarLenUnicode>(ds, field)?
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
        TypeDescriptor::VarLenAscii => read_member::<VarLenAscii>(ds, field)?
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
        TypeDescriptor::FixedAscii(n) if *n <= FIXED_STRING_MAX => {
            read_member::<FixedAscii<FIXED_STRING_MAX>>(ds, field)?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect()
        }
        TypeDescriptor::FixedUnicode(n) if *n <= FIXED_STRING_MAX => {
            read_member::<FixedUnicode<FIXED_STRING_MAX>>(ds, field)?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect()
        }
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) | TypeDescriptor::Float(_) => {
            return Ok(Some(FieldValues::Numbers(read_member::<f64>(ds, field)?)));
        }
        _ => return Ok(None),
    };
    Ok(Some(FieldValues::Strings(
        strings.into_iter().map(strip_quotes).collect(),
    )))
}

thread_local! {
    static MEMBER_NAME: RefCell<String> = const { RefCell::new(String::new()) };
}

/// A compound element holding only the field named by `MEMBER_NAME`.
/// HDF5 matches compound fields by name, so reading a dataset into
/// `Member<T>` extracts that one field converted to `T`.
#[repr(transparent)]
struct Member<T>(T);

// SAFETY: `Member<T>` is `repr(transparent)` over `T`, so its layout is a
// compound of `size_of::<T>()` bytes with a single `T` field at offset 0.
unsafe impl<T: H5Type> H5Type for Member<T> {
    fn type_descriptor() -> TypeDescriptor {
        let name = MEMBER_NAME.with(|n| n.borrow().clone());
        TypeDescriptor::Compound(CompoundType {
            fields: vec![CompoundField {
                name,
                ty: T::type_descriptor(),
                offset: 0,
                index: 0,
            }],
            size: std::mem::size_of::<T>(),
        })
    }
}

fn read_member<T: H5Type>(ds: &Dataset, field: &str) -> Result<Vec<T>> {
    MEMBER_NAME.with(|n| *n.borrow_mut() = field.to_string());
    let members = ds.read_raw::<Member<T>>().map_err(h5err)?;
    Ok(members.into_iter().map(|m| m.0).collect())
}

/// A scalar string attribute, if present and readable.
pub(crate) fn read_attr_string(loc: &Location, name: &str) -> Option<String> {
    let attr = loc.attr(name).ok()?;
    let s = match attr.dtype().and_then(|t| t.to_descriptor()).ok()? {
        TypeDescriptor::VarLenUnicode => attr.read_scalar::<VarLenUnicode>().ok()?.as_str().to_string(),
        TypeDescriptor::VarLenAscii => attr.read_scalar::<VarLenAscii>().ok()?.as_str().to_string(),
        TypeDescriptor::FixedAscii(n) if n <= FIXED_STRING_MAX => attr
            .read_scalar::<FixedAscii<FIXED_STRING_MAX>>()
            .ok()?
            .as_str()
            .to_string(),
        _ => return None,
    };
    Some(s)
}

/// Names of the direct members of `group` that are groups.
pub(crate) fn subgroup_names(group: &Group) -> Result<Vec<String>> {
    Ok(group
        .member_names()
        .map_err(h5err)?
        .into_iter()
        .filter(|n| group.group(n).is_ok())
        .collect())
}

fn strip_quotes(s: String) -> String {
    match s.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        Some(inner) => inner.to_string(),
        None => s,
    }
}
