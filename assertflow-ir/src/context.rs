//! The main handle to an IR instance.
//!
//! [`Context`] contains several [slotmap](https://github.com/orlp/slotmap) collections to maintain
//! the IR ECS.
//!
//! It is passed around as a mutable reference to many of the assertflow-ir APIs, and as a shared
//! reference to the analyses, which never modify it.

use slotmap::{DefaultKey, SlotMap};

use crate::{
    block::BlockContent,
    function::FunctionContent,
    module::{ModuleContent, ModuleIterator},
    value::ValueContent,
};

/// The main IR context handle.
///
/// Every module, function, block and value is stored here.
#[derive(Default)]
pub struct Context {
    pub(crate) modules: SlotMap<DefaultKey, ModuleContent>,
    pub(crate) functions: SlotMap<DefaultKey, FunctionContent>,
    pub(crate) blocks: SlotMap<DefaultKey, BlockContent>,
    pub(crate) values: SlotMap<DefaultKey, ValueContent>,
}

impl Context {
    /// Return an interator for every module in this context.
    pub fn module_iter(&self) -> ModuleIterator {
        ModuleIterator::new(self)
    }
}

use std::fmt::{Display, Error, Formatter};

impl Display for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", crate::printer::to_string(self))
    }
}

impl From<Context> for String {
    fn from(context: Context) -> Self {
        crate::printer::to_string(&context)
    }
}
