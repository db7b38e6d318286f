//! The heuristic scorer (spec §4.C): Greedy, HDRF, and their per-partition
//! arithmetic mean, each followed by argmax-with-lowest-index selection.

use ahash::AHashSet;

use edgecut_core::{Error, PartitionId, Result, ScorerKind, VertexId};

/// Balance/replication constants shared by every scorer variant.
const EPSILON: f64 = 1.0;
const LAMBDA: f64 = 1.0;

/// Everything a scorer needs to evaluate every candidate partition for one
/// edge `(u, v)`. `sizes[i]` is `|P[i].edges|`; `u_parts`/`v_parts` are each
/// endpoint's current partition membership (including placements made
/// earlier in the same window); `du`/`dv` are each endpoint's *current local*
/// degree (the global snapshot plus this window's accumulated increment).
pub struct ScoreContext<'a> {
    pub u: VertexId,
    pub v: VertexId,
    pub du: i64,
    pub dv: i64,
    pub sizes: &'a [usize],
    pub u_parts: &'a AHashSet<PartitionId>,
    pub v_parts: &'a AHashSet<PartitionId>,
}

fn balance_term(size_i: usize, dmax: f64, dmin: f64) -> f64 {
    LAMBDA * (dmax - size_i as f64) / (EPSILON + dmax - dmin)
}

fn greedy_term(i: PartitionId, u_parts: &AHashSet<PartitionId>, v_parts: &AHashSet<PartitionId>) -> f64 {
    u_parts.contains(&i) as u8 as f64 + v_parts.contains(&i) as u8 as f64
}

fn hdrf_g(i: PartitionId, parts: &AHashSet<PartitionId>, theta: f64) -> f64 {
    if parts.contains(&i) {
        1.0 + (1.0 - theta)
    } else {
        0.0
    }
}

fn hdrf_term(
    i: PartitionId,
    u_parts: &AHashSet<PartitionId>,
    v_parts: &AHashSet<PartitionId>,
    theta_u: f64,
    theta_v: f64,
) -> f64 {
    hdrf_g(i, u_parts, theta_u) + hdrf_g(i, v_parts, theta_v)
}

/// Scores every partition `0..k` for `ctx` under `kind` and returns the
/// winning index, ties broken toward the lowest index.
///
/// # Panics
///
/// Debug builds assert `ctx.du > 0 && ctx.dv > 0` (spec precondition: the
/// worker increments both degrees before scoring).
pub fn select_partition(kind: ScorerKind, ctx: &ScoreContext) -> Result<PartitionId> {
    debug_assert!(ctx.du > 0 && ctx.dv > 0, "scorer precondition violated");

    let k = ctx.sizes.len();
    if k == 0 {
        return Err(Error::NoPartitionSelected(ctx.u, ctx.v));
    }
    let dmax = *ctx.sizes.iter().max().unwrap() as f64;
    let dmin = *ctx.sizes.iter().min().unwrap() as f64;
    let theta_u = ctx.du as f64 / (ctx.du + ctx.dv) as f64;
    let theta_v = 1.0 - theta_u;

    let mut best_i = None;
    let mut best_score = f64::NEG_INFINITY;
    for i in 0..k {
        let b = balance_term(ctx.sizes[i], dmax, dmin);
        let score = match kind {
            ScorerKind::Greedy => b + greedy_term(i, ctx.u_parts, ctx.v_parts),
            ScorerKind::Hdrf => b + hdrf_term(i, ctx.u_parts, ctx.v_parts, theta_u, theta_v),
            ScorerKind::Mixed => {
                let greedy = b + greedy_term(i, ctx.u_parts, ctx.v_parts);
                let hdrf = b + hdrf_term(i, ctx.u_parts, ctx.v_parts, theta_u, theta_v);
                (greedy + hdrf) / 2.0
            }
        };
        if score > best_score {
            best_score = score;
            best_i = Some(i);
        }
    }

    best_i.ok_or(Error::NoPartitionSelected(ctx.u, ctx.v))
}
