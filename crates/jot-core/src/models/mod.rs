pub mod note;

pub use note::{Location, Note, NoteDraft};
