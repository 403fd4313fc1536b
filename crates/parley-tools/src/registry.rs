use std::collections::HashMap;
use std::sync::Arc;

use parley_core::{ParleyError, Result, ToolDeclaration, ToolHandler};

/// Immutable name → handler table, built once at startup and shared behind `Arc`.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    /// Declarations in registration order.
    declarations: Vec<ToolDeclaration>,
}

/// Collects handlers before the registry is frozen.
#[derive(Default)]
pub struct ToolRegistryBuilder {
    handlers: Vec<Arc<dyn ToolHandler>>,
}

impl ToolRegistryBuilder {
    pub fn register(mut self, handler: impl ToolHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Freeze the registry. Two handlers declaring the same name is an error.
    pub fn build(self) -> Result<ToolRegistry> {
        let mut handlers = HashMap::with_capacity(self.handlers.len());
        let mut declarations = Vec::with_capacity(self.handlers.len());
        for handler in self.handlers {
            let decl = handler.declaration();
            if handlers.contains_key(&decl.name) {
                return Err(ParleyError::DuplicateTool(decl.name));
            }
            handlers.insert(decl.name.clone(), handler);
            declarations.push(decl);
        }
        Ok(ToolRegistry {
            handlers,
            declarations,
        })
    }
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// A registry with no tools; the model is offered nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up a handler by the name the model used.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ToolHandler>> {
        self.handlers
            .get(name)
            .cloned()
            .ok_or_else(|| ParleyError::UnknownTool(name.to_string()))
    }

    /// Declarations offered to the model, in registration order.
    pub fn declarations(&self) -> &[ToolDeclaration] {
        &self.declarations
    }

    pub fn names(&self) -> Vec<&str> {
        self.declarations.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}
