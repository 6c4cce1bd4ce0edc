pub(crate) mod binindex;
pub(crate) mod restree;

pub use binindex::*;
pub use restree::*;
