//! Named stencil registry

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use log::debug;

use super::descriptor::{Descriptor, DescriptorError};

/// Registry of shape descriptors, looked up case-insensitively by name
#[derive(Debug, Default, Clone)]
pub struct StencilRegistry {
    stencils: HashMap<String, Rc<Descriptor>>,
}

impl StencilRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor under `name`
    pub fn register(
        &mut self,
        name: &str,
        descriptor: Descriptor,
    ) -> Result<(), DescriptorError> {
        let key = name.to_lowercase();
        if self.stencils.contains_key(&key) {
            return Err(DescriptorError::Duplicate {
                name: name.to_string(),
                span: 0..0,
            });
        }
        self.stencils.insert(key, Rc::new(descriptor));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Rc<Descriptor>> {
        self.stencils.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stencils.contains_key(&name.to_lowercase())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stencils.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.stencils.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stencils.is_empty()
    }

    /// Load every `<shape name="..">` of a `<shapes>` library document.
    ///
    /// Returns the number of descriptors added. Nothing is registered if any
    /// shape fails to load.
    pub fn load_library(&mut self, xml: &str) -> Result<usize, DescriptorError> {
        let doc = roxmltree::Document::parse(xml)
            .map_err(|e| DescriptorError::from_xml(&e, xml))?;
        let root = doc.root_element();
        if root.tag_name().name() != "shapes" {
            return Err(DescriptorError::UnexpectedRoot {
                span: root.range(),
                expected: "shapes",
                found: root.tag_name().name().to_string(),
            });
        }

        let mut loaded: Vec<(String, Descriptor)> = Vec::new();
        for node in root.children().filter(|n| n.has_tag_name("shape")) {
            let name = node
                .attribute("name")
                .filter(|n| !n.trim().is_empty())
                .ok_or(DescriptorError::MissingName { span: node.range() })?;
            let key = name.to_lowercase();
            if self.stencils.contains_key(&key) || loaded.iter().any(|(k, _)| *k == key) {
                return Err(DescriptorError::Duplicate {
                    name: name.to_string(),
                    span: node.range(),
                });
            }
            loaded.push((key, Descriptor::from_node(node)?));
        }

        let count = loaded.len();
        for (key, descriptor) in loaded {
            self.stencils.insert(key, Rc::new(descriptor));
        }
        debug!(count, total = self.stencils.len(); "loaded stencil library");
        Ok(count)
    }

    /// Read and load a library file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize, DescriptorError> {
        let xml = std::fs::read_to_string(path)?;
        self.load_library(&xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = r#"<shapes>
  <shape name="Cylinder" w="60" h="80"><background><ellipse x="0" y="0" w="60" h="20"/></background></shape>
  <shape name="Note" w="80" h="100" aspect="fixed"/>
</shapes>"#;

    #[test]
    fn test_load_library() {
        let mut registry = StencilRegistry::new();
        assert_eq!(registry.load_library(LIBRARY).expect("load"), 2);
        assert_eq!(registry.names(), vec!["cylinder", "note"]);
        assert!(registry.contains("CYLINDER"));
        assert_eq!(registry.get("cylinder").map(|d| d.w0()), Some(60.0));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = StencilRegistry::new();
        registry.load_library(LIBRARY).expect("load");
        let err = registry
            .register("note", Descriptor::parse("<shape/>").expect("parse"))
            .unwrap_err();
        assert!(matches!(err, DescriptorError::Duplicate { .. }));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_missing_name_loads_nothing() {
        let mut registry = StencilRegistry::new();
        let err = registry
            .load_library(r#"<shapes><shape name="a"/><shape/></shapes>"#)
            .unwrap_err();
        assert!(matches!(err, DescriptorError::MissingName { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_wrong_library_root() {
        let mut registry = StencilRegistry::new();
        let err = registry.load_library("<shape/>").unwrap_err();
        assert!(matches!(err, DescriptorError::UnexpectedRoot { .. }));
    }
}
