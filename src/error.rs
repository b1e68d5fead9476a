use thiserror::Error;

use crate::slot::ObjectPtr;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("request of {size} bytes is outside [{min}, {max}] or not a multiple of 8")]
    InvalidSize { size: usize, min: usize, max: usize },

    #[error("{ptr} was not handed out by this allocator")]
    InvalidPointer { ptr: ObjectPtr },

    #[error("{ptr} has already been released")]
    DoubleRelease { ptr: ObjectPtr },

    #[error("page supplier could not provide {size} bytes")]
    OutOfMemory { size: usize },

    #[error("page supplier returned {actual} bytes, expected {expected}")]
    PageSize { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("free list is corrupt: {0}")]
    Corrupt(&'static str),
}
