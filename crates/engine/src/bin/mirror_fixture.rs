//! A minimal partition mirror speaking exactly the coprocess line protocol
//! (spec §6): `SGET Pi\n` replies with the `;`-joined `"u,v"` body of
//! partition `i` (possibly empty); `SADD Pi '...'\n` appends to it and
//! replies `OK\n`. Used as a real subprocess fixture in crash-recovery
//! tests so they exercise the wire protocol instead of stubbing it out.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};

fn main() {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut store: HashMap<String, String> = HashMap::new();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let reply = handle(&line, &mut store);
        if writeln!(stdout, "{reply}").is_err() || stdout.flush().is_err() {
            break;
        }
    }
}

fn handle(line: &str, store: &mut HashMap<String, String>) -> String {
    if let Some(key) = line.strip_prefix("SGET ") {
        return store.get(key.trim()).cloned().unwrap_or_default();
    }
    if let Some(rest) = line.strip_prefix("SADD ") {
        if let Some((key, quoted)) = rest.split_once(' ') {
            let body = quoted.trim().trim_start_matches('\'').trim_end_matches('\'');
            let entry = store.entry(key.to_string()).or_default();
            if !body.is_empty() {
                if entry.is_empty() {
                    *entry = body.to_string();
                } else {
                    entry.push(';');
                    entry.push_str(body);
                }
            }
            return "OK".to_string();
        }
    }
    "ERR".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sadd_then_sget_round_trips() {
        let mut store = HashMap::new();
        assert_eq!(handle("SADD P0 '1,2;2,3'", &mut store), "OK");
        assert_eq!(handle("SGET P0", &mut store), "1,2;2,3");
    }

    #[test]
    fn sadd_appends_across_calls() {
        let mut store = HashMap::new();
        handle("SADD P0 '1,2'", &mut store);
        handle("SADD P0 '2,3'", &mut store);
        assert_eq!(handle("SGET P0", &mut store), "1,2;2,3");
    }

    #[test]
    fn sget_of_unknown_partition_is_empty() {
        let mut store = HashMap::new();
        assert_eq!(handle("SGET P9", &mut store), "");
    }
}
