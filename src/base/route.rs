//! Routes through the schema tree.

use crate::base::QualName;

/// An ordered list of qualified names naming a descendant schema node.
///
/// A *data route* is a schema route containing only data-node names (no
/// choice/case segments); its textual form is the *data path*, rendered
/// with `/module:name` segments.
pub type SchemaRoute = Vec<QualName>;

/// Render a data route as a data path.
///
/// The module prefix is emitted for the first segment and at every
/// namespace boundary, matching RFC 7951 member naming.
pub fn data_path(route: &[QualName]) -> String {
    let mut out = String::new();
    let mut prev_module: Option<&str> = None;
    for qn in route {
        out.push('/');
        if prev_module != Some(qn.module.as_str()) {
            out.push_str(&qn.module);
            out.push(':');
        }
        out.push_str(&qn.name);
        prev_module = Some(qn.module.as_str());
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_path_prefixes_at_boundaries() {
        let route = vec![
            QualName::new("bag", "example-2"),
            QualName::new("foo", "example-2"),
            QualName::new("aug", "other"),
        ];
        assert_eq!(data_path(&route), "/example-2:bag/foo/other:aug");
        assert_eq!(data_path(&[]), "/");
    }
}
