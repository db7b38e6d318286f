//! Parsing for the input edge file: whitespace-separated `u v` pairs, one
//! per line (spec §6). Self-loops are filtered; `(u, v)` and `(v, u)` are
//! the same edge after canonicalization.

use std::io::BufRead;
use std::path::Path;

use ahash::{AHashMap, AHashSet};

use crate::edge::{Edge, VertexId};
use crate::error::{Error, Result};
use crate::vertex::Vertex;

/// Parses one line of the edge file. Returns `Ok(None)` for a blank line,
/// `Ok(Some(edge))` for a valid, non-self-loop edge, and an error for
/// anything else (spec §7: malformed input is fatal at load time).
pub fn parse_edge_line(path: &Path, line_no: usize, line: &str) -> Result<Option<Edge>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut parts = line.split_ascii_whitespace();
    let (Some(u), Some(v), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(Error::MalformedEdge {
            path: path.to_path_buf(),
            line: line_no,
            text: line.to_string(),
        });
    };

    let parse = |s: &str| -> Result<VertexId> {
        s.parse().map_err(|_| Error::MalformedEdge {
            path: path.to_path_buf(),
            line: line_no,
            text: line.to_string(),
        })
    };
    let u = parse(u)?;
    let v = parse(v)?;

    if u == v {
        // Self-loop: silently skipped per spec §7.
        return Ok(None);
    }
    Ok(Some(Edge::new(u, v)))
}

/// Eagerly reads the whole edge file, deduplicating `(u,v)`/`(v,u)` entries
/// and filtering self-loops, returning the full edge set plus a
/// zero-initialized `Vertex` for every endpoint observed.
pub fn load_edge_file(
    path: impl AsRef<Path>,
) -> Result<(AHashSet<Edge>, AHashMap<VertexId, Vertex>)> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = std::io::BufReader::new(file);

    let mut edges = AHashSet::new();
    let mut verts = AHashMap::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(edge) = parse_edge_line(path, idx + 1, &line)? {
            if edges.insert(edge) {
                verts.entry(edge.u).or_insert_with(Vertex::new);
                verts.entry(edge.v).or_insert_with(Vertex::new);
            }
        }
    }

    Ok((edges, verts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_dataset(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(f, "{line}").unwrap();
        }
        f.flush().unwrap();
        f
    }

    #[test]
    fn loads_and_dedupes_and_skips_self_loops() {
        let f = write_dataset(&["1 2", "2 1", "3 3", "2 3"]);
        let (edges, verts) = load_edge_file(f.path()).unwrap();
        assert_eq!(edges.len(), 2);
        assert!(edges.contains(&Edge::new(1, 2)));
        assert!(edges.contains(&Edge::new(2, 3)));
        assert_eq!(verts.len(), 3);
    }

    #[test]
    fn rejects_malformed_lines() {
        let f = write_dataset(&["1 2", "not-a-number 2"]);
        let err = load_edge_file(f.path()).unwrap_err();
        assert!(matches!(err, Error::MalformedEdge { line: 2, .. }));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let f = write_dataset(&["1 2", "", "   ", "3 4"]);
        let (edges, _) = load_edge_file(f.path()).unwrap();
        assert_eq!(edges.len(), 2);
    }
}
