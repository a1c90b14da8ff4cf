//! Structural control-flow recovery: turn a simplified `Graph` plus its
//! dominator tree into a tree of [`Region`]s mirroring Java source shape
//! (if/else, loops, switch, try/catch) instead of a flat block graph.
//!
//! There is no single upstream routine this module ports; it is assembled
//! from the same building blocks the rest of the pipeline already computes
//! (dominators, post-dominators, back-edges, loop bodies) the way
//! `analysis/loop_analysis.rs`'s `LoopInfo` groups a back-edge set into one
//! named region.

pub mod conditionals;
pub mod loops;
pub mod postdom;
pub mod switches;
pub mod try_catch;

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::config::Config;
use crate::error::{DecompileError, Result};
use crate::graph::{BlockKind, EdgeType};
use crate::ir::BlockId;

use crate::graph::Graph;

pub use loops::LoopInfo;
pub use try_catch::TryGroup;

/// How a loop's header and latch relate to its exit test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// Header tests the condition before the body ever runs.
    While,
    /// Latch tests the condition after the body runs at least once.
    DoWhile,
    /// No conditional exit reachable from inside the loop's own blocks;
    /// every exit is via `break`/`return`/`throw`.
    Endless,
}

/// One element of a [`Region::Linear`] sequence: either a leaf basic block
/// or a nested structured region.
#[derive(Debug, Clone)]
pub enum RegionItem {
    Block(BlockId),
    Nested(Region),
}

/// One `switch` arm: the keys that reach it (empty for `default`), its
/// region, and whether it falls through into the following arm's blocks
/// (approximated as "shares blocks with the next arm", since explicit
/// Dalvik `goto`-out-of-switch already makes most arms self-contained).
#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub keys: Vec<i32>,
    pub region: Region,
}

/// A node in the recovered control-flow tree.
#[derive(Debug, Clone)]
pub enum Region {
    /// A straight-line run of blocks and/or nested regions with no branch
    /// of its own, ending in a fall-through, a terminator, or a jump to an
    /// enclosing scope's continuation point.
    Linear(Vec<RegionItem>),
    If {
        cond: BlockId,
        then_branch: Box<Region>,
        else_branch: Option<Box<Region>>,
    },
    Loop {
        kind: LoopKind,
        header: BlockId,
        body: Box<Region>,
        exits: Vec<BlockId>,
    },
    Switch {
        selector: BlockId,
        cases: Vec<SwitchCase>,
        default: Box<Region>,
    },
    Try {
        body: Box<Region>,
        handlers: Vec<(Option<String>, Region)>,
    },
    /// A block set the recursive walk gave up trying to structure further
    /// (irreducible control flow the node-splitting pass didn't resolve
    /// within its fanout bound). Rendered as a labeled-block fallback by
    /// the writer rather than failing the whole method.
    Unstructured(Vec<BlockId>),
}

impl Region {
    /// Every block id this region (including all nested regions) covers,
    /// for the partition-invariant check used by tests: every reachable
    /// block must appear in exactly one innermost region.
    pub fn blocks(&self) -> Vec<BlockId> {
        let mut out = Vec::new();
        self.collect_blocks(&mut out);
        out
    }

    fn collect_blocks(&self, out: &mut Vec<BlockId>) {
        match self {
            Region::Linear(items) => {
                for item in items {
                    match item {
                        RegionItem::Block(b) => out.push(*b),
                        RegionItem::Nested(r) => r.collect_blocks(out),
                    }
                }
            }
            Region::If { cond, then_branch, else_branch } => {
                out.push(*cond);
                then_branch.collect_blocks(out);
                if let Some(e) = else_branch {
                    e.collect_blocks(out);
                }
            }
            Region::Loop { body, .. } => body.collect_blocks(out),
            Region::Switch { selector, cases, default } => {
                out.push(*selector);
                for case in cases {
                    case.region.collect_blocks(out);
                }
                default.collect_blocks(out);
            }
            Region::Try { body, handlers } => {
                body.collect_blocks(out);
                for (_, h) in handlers {
                    h.collect_blocks(out);
                }
            }
            Region::Unstructured(blocks) => out.extend(blocks.iter().copied()),
        }
    }
}

/// A composable membership predicate: "is this block still part of the
/// region currently being walked". Built by chaining `until`/`within`
/// restrictions onto an unrestricted root so nested walks (an if-arm
/// inside a loop body inside a try) can't wander outside any enclosing
/// scope even when their own stopping point lies further out.
#[derive(Clone)]
struct Frame {
    allowed: Rc<dyn Fn(BlockId) -> bool>,
}

impl Frame {
    fn root() -> Frame {
        Frame { allowed: Rc::new(|_| true) }
    }

    fn until(&self, stop: Option<BlockId>) -> Frame {
        let Some(stop) = stop else { return self.clone() };
        let parent = self.allowed.clone();
        Frame { allowed: Rc::new(move |b| b != stop && parent(b)) }
    }

    fn within(&self, set: Rc<HashSet<BlockId>>) -> Frame {
        let parent = self.allowed.clone();
        Frame { allowed: Rc::new(move |b| set.contains(&b) && parent(b)) }
    }

    fn contains(&self, b: BlockId) -> bool {
        (self.allowed)(b)
    }
}

struct StructureCtx<'a> {
    graph: &'a Graph,
    idom: &'a HashMap<BlockId, BlockId>,
    ipdom: HashMap<BlockId, BlockId>,
    loops: HashMap<BlockId, LoopInfo>,
    try_groups: Vec<TryGroup>,
    config: &'a Config,
}

impl<'a> StructureCtx<'a> {
    fn try_starting_at(&self, block: BlockId) -> Option<&TryGroup> {
        self.try_groups.iter().find(|g| g.entry == block)
    }
}

/// Recover a structured [`Region`] tree for `graph`, rooted at its entry
/// block.
pub fn identify_structures(graph: &Graph, idom: &HashMap<BlockId, BlockId>, config: &Config) -> Result<Region> {
    let ipdom = postdom::immediate_post_dominators(graph);
    let loops = loops::find_loops(graph, idom);
    let try_groups = try_catch::find_try_groups(graph, idom, &ipdom);
    let ctx = StructureCtx { graph, idom, ipdom, loops, try_groups, config };
    let mut consumed: HashSet<BlockId> = HashSet::new();
    walk(&ctx, graph.entry, Frame::root(), &mut consumed, 0, false, false)
}

fn walk(
    ctx: &StructureCtx,
    start: BlockId,
    frame: Frame,
    consumed: &mut HashSet<BlockId>,
    depth: usize,
    suppress_loop_at_start: bool,
    suppress_try_at_start: bool,
) -> Result<Region> {
    if depth > ctx.config.max_recursion_depth {
        return Err(DecompileError::RecursionLimitExceeded(ctx.config.max_recursion_depth, "identify_structures".into()));
    }

    let mut items = Vec::new();
    let mut cur = start;
    loop {
        if !frame.contains(cur) || consumed.contains(&cur) {
            break;
        }
        let is_start = cur == start;

        if !(suppress_try_at_start && is_start) {
            if let Some(group) = ctx.try_starting_at(cur) {
                let group = group.clone();
                consumed.insert(cur);
                let body_frame = frame.within(Rc::new(group.protected.clone()));
                let body_region = walk(ctx, cur, body_frame, consumed, depth + 1, true, true)?;

                let mut handler_regions = Vec::new();
                for (catch_type, handler) in &group.handlers {
                    let handler_frame = frame.until(group.exit);
                    let region = walk(ctx, *handler, handler_frame, consumed, depth + 1, false, false)?;
                    handler_regions.push((catch_type.clone(), region));
                }

                items.push(RegionItem::Nested(Region::Try {
                    body: Box::new(body_region),
                    handlers: handler_regions,
                }));

                match group.exit {
                    Some(exit) => {
                        cur = exit;
                        continue;
                    }
                    None => break,
                }
            }
        }

        if !(suppress_loop_at_start && is_start) {
            if let Some(loop_info) = ctx.loops.get(&cur).cloned() {
                let body_frame = frame.within(Rc::new(loop_info.body.clone()));
                let body_region = walk(ctx, loop_info.header, body_frame, consumed, depth + 1, true, false)?;
                items.push(RegionItem::Nested(Region::Loop {
                    kind: loop_info.kind,
                    header: loop_info.header,
                    body: Box::new(body_region),
                    exits: loop_info.exits.clone(),
                }));

                match single_exit(&loop_info, &frame) {
                    Some(exit) => {
                        cur = exit;
                        continue;
                    }
                    None => break,
                }
            }
        }

        consumed.insert(cur);
        let block = ctx.graph.get(cur)?;
        match block.kind {
            BlockKind::Conditional => {
                let true_target = edge_target(ctx.graph, cur, |e| matches!(e.edge_type, EdgeType::True));
                let false_target = edge_target(ctx.graph, cur, |e| matches!(e.edge_type, EdgeType::False));
                let (Some(true_target), Some(false_target)) = (true_target, false_target) else {
                    return Err(DecompileError::InternalInvariantViolation(format!(
                        "conditional block {} missing true/false edge",
                        cur
                    )));
                };
                let join = ctx.ipdom.get(&cur).copied();
                let arms = conditionals::compute_if_arms(ctx.graph, ctx.idom, cur, true_target, false_target, join);

                let then_frame = frame.within(Rc::new(arms.then_set.clone())).until(join);
                let then_region = walk(ctx, arms.then_entry, then_frame, consumed, depth + 1, false, false)?;

                let else_region = match arms.else_entry {
                    Some(entry) => {
                        let else_frame = frame.within(Rc::new(arms.else_set.clone())).until(join);
                        Some(Box::new(walk(ctx, entry, else_frame, consumed, depth + 1, false, false)?))
                    }
                    None => None,
                };

                items.push(RegionItem::Nested(Region::If {
                    cond: cur,
                    then_branch: Box::new(then_region),
                    else_branch: else_region,
                }));

                match join.filter(|j| frame.contains(*j)) {
                    Some(j) => {
                        cur = j;
                        continue;
                    }
                    None => break,
                }
            }
            BlockKind::Switch => {
                let cases: smallvec::SmallVec<[(i32, BlockId); 4]> = ctx
                    .graph
                    .edges
                    .iter()
                    .filter(|e| e.from == cur)
                    .filter_map(|e| match &e.edge_type {
                        EdgeType::Switch(key) => Some((*key, e.to)),
                        _ => None,
                    })
                    .collect();
                let default = edge_target(ctx.graph, cur, |e| matches!(e.edge_type, EdgeType::FallThrough));
                let Some(default) = default else {
                    return Err(DecompileError::InternalInvariantViolation(format!(
                        "switch block {} missing default edge",
                        cur
                    )));
                };
                let join = ctx.ipdom.get(&cur).copied();
                let (arms, default_arm) = switches::compute_switch_arms(ctx.graph, ctx.idom, &cases, default, join);

                let mut structured_cases = Vec::with_capacity(arms.len());
                for arm in arms {
                    let arm_frame = frame.within(Rc::new(arm.blocks.clone())).until(join);
                    let region = walk(ctx, arm.entry, arm_frame, consumed, depth + 1, false, false)?;
                    structured_cases.push(SwitchCase { keys: arm.keys, region });
                }
                let default_frame = frame.within(Rc::new(default_arm.blocks.clone())).until(join);
                let default_region = walk(ctx, default_arm.entry, default_frame, consumed, depth + 1, false, false)?;

                items.push(RegionItem::Nested(Region::Switch {
                    selector: cur,
                    cases: structured_cases,
                    default: Box::new(default_region),
                }));

                match join.filter(|j| frame.contains(*j)) {
                    Some(j) => {
                        cur = j;
                        continue;
                    }
                    None => break,
                }
            }
            _ => {
                items.push(RegionItem::Block(cur));
                match block.successors.as_slice() {
                    [single] if frame.contains(*single) && !consumed.contains(single) => {
                        cur = *single;
                        continue;
                    }
                    _ => break,
                }
            }
        }
    }
    Ok(Region::Linear(items))
}

fn single_exit(loop_info: &LoopInfo, frame: &Frame) -> Option<BlockId> {
    let mut reachable: Vec<BlockId> = loop_info.exits.iter().copied().filter(|e| frame.contains(*e)).collect();
    reachable.dedup();
    match reachable.as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

fn edge_target(graph: &Graph, from: BlockId, pred: impl Fn(&crate::graph::Edge) -> bool) -> Option<BlockId> {
    graph.edges.iter().find(|e| e.from == from && pred(e)).map(|e| e.to)
}
