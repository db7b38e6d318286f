use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use parking_lot::Mutex;

use edgecut_core::{Edge, Error, Partition, PartitionId, Result};

/// A durable partition mirror reached over a line-oriented text protocol
/// (spec §4.A, §6): `SGET Pi\n` returns the semicolon-joined `"u,v"` edges of
/// partition `i`; `SADD Pi '...'\n` merges edges into it and replies `OK\n`.
///
/// This backend exists to give [`crate::LocalBackend`]'s crash drill
/// something to recover from — it is not meant to be driven directly as a
/// worker's primary [`crate::StateBackend`].
pub struct CoprocessBackend {
    io: Mutex<CoprocessIo>,
}

struct CoprocessIo {
    // Kept alive for the duration of the backend; never read from directly.
    #[allow(dead_code)]
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl CoprocessBackend {
    /// Spawns `cmd args...` and wires its stdin/stdout into the protocol.
    pub fn spawn(cmd: &str, args: &[&str]) -> Result<Self> {
        let mut child = Command::new(cmd)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Backend(format!("failed to spawn coprocess {cmd}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Backend("coprocess stdin not piped".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Backend("coprocess stdout not piped".into()))?;

        Ok(Self {
            io: Mutex::new(CoprocessIo {
                child,
                stdin,
                stdout: BufReader::new(stdout),
            }),
        })
    }

    fn request(&self, line: &str) -> Result<String> {
        let mut io = self.io.lock();
        io.stdin
            .write_all(line.as_bytes())
            .and_then(|_| io.stdin.flush())
            .map_err(|e| Error::Backend(format!("coprocess write failed: {e}")))?;

        let mut reply = String::new();
        io.stdout
            .read_line(&mut reply)
            .map_err(|e| Error::Backend(format!("coprocess read failed: {e}")))?;
        if reply.is_empty() {
            return Err(Error::Backend("coprocess closed the connection".into()));
        }
        Ok(reply.trim_end().to_string())
    }

    fn encode_edges(part: &Partition) -> String {
        part.edges
            .iter()
            .map(Edge::to_kv_string)
            .collect::<Vec<_>>()
            .join(";")
    }

    fn decode_edges(body: &str) -> Partition {
        let mut part = Partition::new();
        if body.is_empty() {
            return part;
        }
        for token in body.split(';') {
            if let Some(edge) = Edge::from_kv_string(token) {
                part.add_edge(edge);
            }
        }
        part
    }

    /// Fetches partition `i`.
    pub fn get_part(&self, i: PartitionId) -> Result<Partition> {
        let reply = self.request(&format!("SGET P{i}\n"))?;
        Ok(Self::decode_edges(&reply))
    }

    /// Fetches all `k` partitions, in order.
    pub fn get_parts(&self, k: usize) -> Result<Vec<Partition>> {
        (0..k).map(|i| self.get_part(i)).collect()
    }

    /// Merges `delta` into partition `i`.
    pub fn put_part(&self, i: PartitionId, delta: &Partition) -> Result<()> {
        if delta.is_empty() {
            return Ok(());
        }
        let body = Self::encode_edges(delta);
        let reply = self.request(&format!("SADD P{i} '{body}'\n"))?;
        if reply != "OK" {
            return Err(Error::Backend(format!(
                "coprocess rejected SADD P{i}: {reply}"
            )));
        }
        Ok(())
    }

    /// Merges a full `k`-length vector of deltas, one per partition.
    pub fn put_parts(&self, delta: &[Partition]) -> Result<()> {
        for (i, d) in delta.iter().enumerate() {
            self.put_part(i, d)?;
        }
        Ok(())
    }
}
