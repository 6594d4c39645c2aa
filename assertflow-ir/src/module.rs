//! A scope containing a collection of [`Function`]s.
//!
//! Both the procedures to be analysed and the declarations of the routines they call live in the
//! same module.

use crate::{
    context::Context,
    function::{Function, FunctionIterator},
};

/// A wrapper around an [ECS](https://github.com/orlp/slotmap) handle into the [`Context`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Module(pub slotmap::DefaultKey);

#[doc(hidden)]
pub struct ModuleContent {
    pub functions: Vec<Function>,
}

impl Module {
    /// Return a new, empty module.
    pub fn new(context: &mut Context) -> Module {
        let content = ModuleContent {
            functions: Vec::new(),
        };
        Module(context.modules.insert(content))
    }

    /// Return an iterator over each of the [`Function`]s in this module.
    pub fn function_iter(&self, context: &Context) -> FunctionIterator {
        FunctionIterator::new(context, self)
    }

    /// Find the function with the qualified `path` which takes `arity` arguments.
    ///
    /// Functions are overloaded by arity, so the same path may name several functions.
    pub fn lookup_function(&self, context: &Context, path: &[String], arity: usize) -> Option<Function> {
        context.modules[self.0]
            .functions
            .iter()
            .find(|func| func.get_path(context) == path && func.num_args(context) == arity)
            .copied()
    }

    /// Find a function by its `::` separated name and arity.
    pub fn lookup_function_by_name(
        &self,
        context: &Context,
        name: &str,
        arity: usize,
    ) -> Option<Function> {
        let path: Vec<String> = name.split("::").map(str::to_owned).collect();
        self.lookup_function(context, &path, arity)
    }
}

/// An iterator over [`Module`]s within a [`Context`].
pub struct ModuleIterator {
    modules: Vec<slotmap::DefaultKey>,
    next: usize,
}

impl ModuleIterator {
    /// Return a new [`Module`] iterator.
    pub fn new(context: &Context) -> ModuleIterator {
        // Copy all the current modules indices, so they may be modified in the context during
        // iteration.
        ModuleIterator {
            modules: context.modules.iter().map(|pair| pair.0).collect(),
            next: 0,
        }
    }
}

impl Iterator for ModuleIterator {
    type Item = Module;

    fn next(&mut self) -> Option<Module> {
        if self.next < self.modules.len() {
            let idx = self.next;
            self.next += 1;
            Some(Module(self.modules[idx]))
        } else {
            None
        }
    }
}
