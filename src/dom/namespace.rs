//! Namespace Resolution
//!
//! Two scoped tables, one frame per open element:
//! - [`NamespaceResolver`] maps prefix -> URI while decoding tags.
//! - [`PrefixTable`] maps URI -> prefix while building the tree, so a node's
//!   resolved namespace can be written back with the prefix that bound it.

/// Well-known namespace URIs
pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
}

/// Namespace binding (prefix -> URI)
#[derive(Debug, Clone)]
struct NsBinding {
    prefix: String,
    uri: String,
    depth: u16,
}

/// Stack-based prefix -> URI resolver
#[derive(Debug)]
pub struct NamespaceResolver {
    /// Stack of namespace bindings
    bindings: Vec<NsBinding>,
    /// Current element depth
    depth: u16,
}

impl Default for NamespaceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceResolver {
    /// Create a new namespace resolver with the xml prefix pre-declared
    pub fn new() -> Self {
        NamespaceResolver {
            bindings: vec![NsBinding {
                prefix: "xml".to_string(),
                uri: ns::XML.to_string(),
                depth: 0,
            }],
            depth: 0,
        }
    }

    /// Enter a new element scope
    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leave an element scope, removing any bindings declared in it
    pub fn pop_scope(&mut self) {
        while let Some(binding) = self.bindings.last() {
            if binding.depth < self.depth {
                break;
            }
            self.bindings.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Declare a namespace binding for the current scope
    pub fn declare(&mut self, prefix: &str, uri: &str) {
        // Don't allow redeclaring xml or xmlns
        if prefix == "xml" || prefix == "xmlns" {
            return;
        }

        self.bindings.push(NsBinding {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
            depth: self.depth,
        });
    }

    /// Declare the default namespace for current scope
    pub fn declare_default(&mut self, uri: &str) {
        self.declare("", uri);
    }

    /// Resolve a prefix to a namespace URI
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        // Search from most recent to oldest
        self.bindings
            .iter()
            .rev()
            .find(|b| b.prefix == prefix)
            .map(|b| b.uri.as_str())
    }

    /// Resolve the default namespace
    pub fn resolve_default(&self) -> Option<&str> {
        self.resolve("")
    }

    /// Get current depth
    pub fn depth(&self) -> u16 {
        self.depth
    }
}

#[derive(Debug, Clone)]
struct PrefixBinding {
    uri: String,
    prefix: String,
    depth: u32,
}

#[derive(Debug)]
struct Frame {
    depth: u32,
    bindings: Vec<PrefixBinding>,
}

/// Scoped URI -> prefix table.
///
/// Each binding records the tree depth of the element that introduced it.
/// A default (`xmlns="..."`) declaration only rebinds a URI that is unbound
/// or whose visible binding was introduced at the same or a deeper level, so
/// an ancestor's explicit prefix for the URI stays in effect.
#[derive(Debug)]
pub struct PrefixTable {
    frames: Vec<Frame>,
}

impl Default for PrefixTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PrefixTable {
    pub fn new() -> Self {
        PrefixTable {
            frames: vec![Frame {
                depth: 0,
                bindings: vec![PrefixBinding {
                    uri: ns::XML.to_string(),
                    prefix: "xml".to_string(),
                    depth: 0,
                }],
            }],
        }
    }

    /// Open the frame of an element at `depth`.
    pub fn push_frame(&mut self, depth: u32) {
        self.frames.push(Frame {
            depth,
            bindings: Vec::new(),
        });
    }

    /// Close the innermost element frame. The base frame is never removed.
    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    fn lookup(&self, uri: &str) -> Option<&PrefixBinding> {
        self.frames
            .iter()
            .rev()
            .flat_map(|f| f.bindings.iter().rev())
            .find(|b| b.uri == uri)
    }

    /// `xmlns="uri"` on the current element
    pub fn declare_default(&mut self, uri: &str) {
        let Some(depth) = self.frames.last().map(|f| f.depth) else {
            return;
        };
        let rebind = match self.lookup(uri) {
            None => true,
            Some(existing) => existing.depth >= depth,
        };
        if rebind {
            self.bind(uri, "", depth);
        }
    }

    /// `xmlns:prefix="uri"` on the current element
    pub fn declare(&mut self, prefix: &str, uri: &str) {
        let Some(depth) = self.frames.last().map(|f| f.depth) else {
            return;
        };
        self.bind(uri, prefix, depth);
    }

    fn bind(&mut self, uri: &str, prefix: &str, depth: u32) {
        if let Some(frame) = self.frames.last_mut() {
            frame.bindings.push(PrefixBinding {
                uri: uri.to_string(),
                prefix: prefix.to_string(),
                depth,
            });
        }
    }

    /// Prefix currently bound to `uri`
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.lookup(uri).map(|b| b.prefix.as_str())
    }
}
