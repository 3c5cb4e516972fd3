//! Render pass dependency solving and barrier generation.
//!
//! Passes declare which images they read and write. An edge A -> B exists when
//! A writes an image B reads. [`GraphSolver::solve`] orders the passes with a
//! depth-first topological sort and rejects cycles;
//! [`GraphSolver::create_image_barriers`] then derives the barriers each pass
//! needs before it runs.

use hashbrown::{HashMap, HashSet};
use tracing::debug;

use ash::vk;

use crate::barrier::ImageBarrier;
use crate::error::{GraphError, Result};
use crate::handle::{AspectTable, RenderImageHandle};
use crate::pass::RenderPass;
use crate::usage::{RenderPassIo, TextureUsage};

/// Generation-checked index of a pass owned by a [`GraphSolver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PassId {
    index: u32,
    generation: u32,
}

impl PassId {
    /// Position of the pass in insertion order.
    pub const fn index(self) -> usize {
        self.index as usize
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    OnStack,
    Done,
}

/// Last write of an image and the layout it is currently in.
struct ImageState {
    write: TextureUsage,
    layout: vk::ImageLayout,
}

/// Owns a set of render passes and orders them by their image dependencies.
#[derive(Default)]
pub struct GraphSolver {
    nodes: Vec<Box<dyn RenderPass>>,
    generation: u32,
    /// Images whose layout is known before any pass runs.
    imports: Vec<TextureUsage>,
}

impl GraphSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a pass.
    pub fn add_node(&mut self, pass: Box<dyn RenderPass>) -> PassId {
        let id = PassId {
            index: self.nodes.len() as u32,
            generation: self.generation,
        };
        self.nodes.push(pass);
        id
    }

    /// Seed an image with a known layout, as if written before the graph runs.
    ///
    /// Needed for images that are read but not produced by any pass this frame.
    /// Importing the same handle again replaces the earlier seed.
    pub fn import_image(&mut self, usage: TextureUsage) {
        self.imports.retain(|import| import.handle != usage.handle);
        self.imports.push(usage);
    }

    /// Drop every pass and import. Ids issued before this call become stale.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.imports.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids of all passes in insertion order.
    pub fn ids(&self) -> Vec<PassId> {
        (0..self.nodes.len() as u32)
            .map(|index| PassId {
                index,
                generation: self.generation,
            })
            .collect()
    }

    fn check(&self, id: PassId) -> Result<usize> {
        if id.generation == self.generation && id.index() < self.nodes.len() {
            Ok(id.index())
        } else {
            Err(GraphError::StalePass {
                index: id.index,
                generation: id.generation,
            })
        }
    }

    pub fn pass(&self, id: PassId) -> Result<&dyn RenderPass> {
        let index = self.check(id)?;
        Ok(self.nodes[index].as_ref())
    }

    pub fn pass_mut(&mut self, id: PassId) -> Result<&mut dyn RenderPass> {
        let index = self.check(id)?;
        Ok(self.nodes[index].as_mut())
    }

    /// Mutable access to every pass in insertion order.
    pub fn passes_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn RenderPass>> {
        self.nodes.iter_mut()
    }

    /// Order passes so every writer of an image precedes its readers.
    ///
    /// Passes with no path between them keep their insertion order, so
    /// identical graphs give identical orders.
    pub fn solve(&self) -> Result<Vec<PassId>> {
        let ios: Vec<RenderPassIo> = self.nodes.iter().map(|pass| pass.io()).collect();
        self.check_single_writer(&ios)?;

        let adjacency = build_adjacency(&ios);
        let order = self.topological_sort(&adjacency)?;

        debug!(
            order = ?order.iter().map(|&i| self.nodes[i].name()).collect::<Vec<_>>(),
            "solved render graph"
        );

        Ok(order
            .into_iter()
            .map(|index| PassId {
                index: index as u32,
                generation: self.generation,
            })
            .collect())
    }

    fn check_single_writer(&self, ios: &[RenderPassIo]) -> Result<()> {
        let mut writers: HashMap<RenderImageHandle, usize> = HashMap::new();
        for (index, io) in ios.iter().enumerate() {
            for output in &io.outputs {
                match writers.get(&output.handle) {
                    Some(&first) if first != index => {
                        return Err(GraphError::MultipleWriters {
                            handle: output.handle,
                            first: self.nodes[first].name().to_string(),
                            second: self.nodes[index].name().to_string(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        writers.insert(output.handle, index);
                    }
                }
            }
        }
        Ok(())
    }

    /// Iterative depth-first search; post-order reversed.
    ///
    /// Roots and edges are walked last-inserted first, which makes the
    /// reversed post-order list unconstrained passes in insertion order.
    fn topological_sort(&self, adjacency: &[Vec<usize>]) -> Result<Vec<usize>> {
        let mut visit = vec![Visit::Unvisited; adjacency.len()];
        let mut post_order = Vec::with_capacity(adjacency.len());
        // (node, index of the next child to visit)
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for start in (0..adjacency.len()).rev() {
            if visit[start] != Visit::Unvisited {
                continue;
            }
            visit[start] = Visit::OnStack;
            stack.push((start, 0));

            while let Some(top) = stack.last_mut() {
                let (node, next_child) = *top;
                let Some(&child) = adjacency[node].iter().rev().nth(next_child) else {
                    stack.pop();
                    visit[node] = Visit::Done;
                    post_order.push(node);
                    continue;
                };
                top.1 += 1;

                match visit[child] {
                    Visit::Unvisited => {
                        visit[child] = Visit::OnStack;
                        stack.push((child, 0));
                    }
                    Visit::OnStack => return Err(self.cycle_error(&stack, child)),
                    Visit::Done => {}
                }
            }
        }

        post_order.reverse();
        Ok(post_order)
    }

    fn cycle_error(&self, stack: &[(usize, usize)], back_edge_target: usize) -> GraphError {
        let start = stack
            .iter()
            .position(|&(node, _)| node == back_edge_target)
            .unwrap_or(0);
        let mut passes: Vec<String> = stack[start..]
            .iter()
            .map(|&(node, _)| self.nodes[node].name().to_string())
            .collect();
        passes.push(self.nodes[back_edge_target].name().to_string());
        GraphError::CircularDependency { passes }
    }

    /// Barriers to issue before each pass in `order`, one list per entry.
    ///
    /// Each read gets one barrier from the image's most recent write (or
    /// import) to the read's usage: source stage and access are the writer's.
    /// The old layout is the layout the image is actually in, which is the
    /// write layout for the first reader and the previous reader's layout for
    /// later ones. Images absent from `aspects` default to `COLOR`.
    pub fn create_image_barriers(
        &self,
        order: &[PassId],
        aspects: &AspectTable,
    ) -> Result<Vec<Vec<ImageBarrier>>> {
        let mut images: HashMap<RenderImageHandle, ImageState> = self
            .imports
            .iter()
            .map(|usage| {
                (
                    usage.handle,
                    ImageState {
                        write: *usage,
                        layout: usage.layout,
                    },
                )
            })
            .collect();

        let mut all_barriers = Vec::with_capacity(order.len());
        for &id in order {
            let pass = self.pass(id)?;
            let io = pass.io();

            let mut barriers = Vec::with_capacity(io.inputs.len());
            let mut seen = HashSet::new();
            for input in &io.inputs {
                if !seen.insert(input.handle) {
                    continue;
                }
                let Some(state) = images.get_mut(&input.handle) else {
                    return Err(GraphError::UndefinedLayout {
                        handle: input.handle,
                        pass: pass.name().to_string(),
                    });
                };

                barriers.push(ImageBarrier {
                    handle: input.handle,
                    old_layout: state.layout,
                    new_layout: input.layout,
                    aspect: aspects
                        .get(&input.handle)
                        .copied()
                        .unwrap_or(vk::ImageAspectFlags::COLOR),
                    src_access: state.write.access,
                    dst_access: input.access,
                    src_stage: state.write.stage,
                    dst_stage: input.stage,
                });
                state.layout = input.layout;
            }

            for output in &io.outputs {
                images.insert(
                    output.handle,
                    ImageState {
                        write: *output,
                        layout: output.layout,
                    },
                );
            }

            all_barriers.push(barriers);
        }

        Ok(all_barriers)
    }
}

impl std::fmt::Debug for GraphSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphSolver")
            .field(
                "passes",
                &self.nodes.iter().map(|pass| pass.name()).collect::<Vec<_>>(),
            )
            .field("generation", &self.generation)
            .field("imports", &self.imports.len())
            .finish()
    }
}

/// Edge i -> j when an output of i is an input of j. Lists are in insertion order.
fn build_adjacency(ios: &[RenderPassIo]) -> Vec<Vec<usize>> {
    ios.iter()
        .enumerate()
        .map(|(i, producer)| {
            ios.iter()
                .enumerate()
                .filter(|&(j, consumer)| i != j && producer.feeds(consumer))
                .map(|(j, _)| j)
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::RenderCtx;

    /// Pass with fixed IO and no commands.
    struct IoPass {
        name: &'static str,
        io: RenderPassIo,
    }

    impl RenderPass for IoPass {
        fn name(&self) -> &str {
            self.name
        }

        fn io(&self) -> RenderPassIo {
            self.io.clone()
        }

        fn execute(&mut self, _ctx: &mut RenderCtx<'_>) {}
    }

    fn pass(name: &'static str, io: RenderPassIo) -> Box<dyn RenderPass> {
        Box::new(IoPass { name, io })
    }

    const SHADOW: RenderImageHandle = RenderImageHandle(0);
    const HDR: RenderImageHandle = RenderImageHandle(1);
    const PRESENT: RenderImageHandle = RenderImageHandle(2);

    fn shadow() -> Box<dyn RenderPass> {
        pass(
            "shadow",
            RenderPassIo::new().write(TextureUsage::depth_attachment_write(SHADOW)),
        )
    }

    fn opaque() -> Box<dyn RenderPass> {
        pass(
            "opaque",
            RenderPassIo::new()
                .read(TextureUsage::fragment_sampled(SHADOW))
                .write(TextureUsage::color_attachment_write(HDR)),
        )
    }

    fn tonemap() -> Box<dyn RenderPass> {
        pass(
            "tonemap",
            RenderPassIo::new()
                .read(TextureUsage::compute_sampled(HDR))
                .write(TextureUsage::compute_storage_write(PRESENT)),
        )
    }

    fn names(solver: &GraphSolver, order: &[PassId]) -> Vec<String> {
        order
            .iter()
            .map(|id| solver.pass(*id).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn shadow_opaque_tonemap_scenario() {
        let mut solver = GraphSolver::new();
        solver.add_node(tonemap());
        solver.add_node(opaque());
        solver.add_node(shadow());

        let order = solver.solve().unwrap();
        assert_eq!(names(&solver, &order), ["shadow", "opaque", "tonemap"]);

        let mut aspects = AspectTable::new();
        aspects.insert(SHADOW, vk::ImageAspectFlags::DEPTH);
        let barriers = solver.create_image_barriers(&order, &aspects).unwrap();

        assert!(barriers[0].is_empty());

        assert_eq!(barriers[1].len(), 1);
        let shadow_read = barriers[1][0];
        assert_eq!(shadow_read.handle, SHADOW);
        assert_eq!(shadow_read.old_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
        assert_eq!(shadow_read.new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(shadow_read.src_stage, vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS);
        assert_eq!(shadow_read.dst_stage, vk::PipelineStageFlags2::FRAGMENT_SHADER);
        assert_eq!(shadow_read.src_access, vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE);
        assert_eq!(shadow_read.dst_access, vk::AccessFlags2::SHADER_READ);
        assert_eq!(shadow_read.aspect, vk::ImageAspectFlags::DEPTH);

        assert_eq!(barriers[2].len(), 1);
        let hdr_read = barriers[2][0];
        assert_eq!(hdr_read.handle, HDR);
        assert_eq!(hdr_read.old_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(hdr_read.new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(hdr_read.src_stage, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(hdr_read.dst_stage, vk::PipelineStageFlags2::COMPUTE_SHADER);
        assert_eq!(hdr_read.aspect, vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn solve_is_deterministic() {
        let mut solver = GraphSolver::new();
        solver.add_node(opaque());
        solver.add_node(shadow());
        solver.add_node(pass("unrelated", RenderPassIo::new()));
        solver.add_node(tonemap());

        let first = solver.solve().unwrap();
        let second = solver.solve().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn independent_passes_keep_insertion_order() {
        let mut solver = GraphSolver::new();
        solver.add_node(pass("a", RenderPassIo::new()));
        solver.add_node(pass("b", RenderPassIo::new()));
        solver.add_node(pass("c", RenderPassIo::new()));

        let order = solver.solve().unwrap();
        assert_eq!(names(&solver, &order), ["a", "b", "c"]);
    }

    #[test]
    fn unconstrained_passes_keep_insertion_order_around_chain() {
        let h = RenderImageHandle(0);
        let mut solver = GraphSolver::new();
        solver.add_node(pass("ui", RenderPassIo::new()));
        solver.add_node(pass(
            "consumer",
            RenderPassIo::new().read(TextureUsage::compute_sampled(h)),
        ));
        solver.add_node(pass(
            "producer",
            RenderPassIo::new().write(TextureUsage::compute_storage_write(h)),
        ));
        solver.add_node(pass("debug", RenderPassIo::new()));

        let order = solver.solve().unwrap();
        assert_eq!(names(&solver, &order), ["ui", "producer", "consumer", "debug"]);
    }

    #[test]
    fn producers_precede_consumers_in_diamond() {
        // a -> b, a -> c, b -> d, c -> d
        let img = |n: u32| RenderImageHandle(10 + n);
        let mut solver = GraphSolver::new();
        solver.add_node(pass(
            "d",
            RenderPassIo::new()
                .read(TextureUsage::compute_sampled(img(1)))
                .read(TextureUsage::compute_sampled(img(2))),
        ));
        solver.add_node(pass(
            "c",
            RenderPassIo::new()
                .read(TextureUsage::compute_sampled(img(0)))
                .write(TextureUsage::compute_storage_write(img(2))),
        ));
        solver.add_node(pass(
            "b",
            RenderPassIo::new()
                .read(TextureUsage::compute_sampled(img(0)))
                .write(TextureUsage::compute_storage_write(img(1))),
        ));
        solver.add_node(pass(
            "a",
            RenderPassIo::new().write(TextureUsage::compute_storage_write(img(0))),
        ));

        let order = solver.solve().unwrap();
        let ios: Vec<RenderPassIo> = order
            .iter()
            .map(|id| solver.pass(*id).unwrap().io())
            .collect();

        for (pos, producer) in ios.iter().enumerate() {
            for consumer in &ios[..pos] {
                assert!(!producer.feeds(consumer), "producer ordered after consumer");
            }
        }
        assert_eq!(names(&solver, &order).first().map(String::as_str), Some("a"));
    }

    #[test]
    fn cycle_is_rejected() {
        let h = RenderImageHandle(0);
        let h2 = RenderImageHandle(1);
        let mut solver = GraphSolver::new();
        solver.add_node(pass(
            "a",
            RenderPassIo::new()
                .read(TextureUsage::compute_sampled(h2))
                .write(TextureUsage::compute_storage_write(h)),
        ));
        solver.add_node(pass(
            "b",
            RenderPassIo::new()
                .read(TextureUsage::compute_sampled(h))
                .write(TextureUsage::compute_storage_write(h2)),
        ));

        let err = solver.solve().unwrap_err();
        match &err {
            GraphError::CircularDependency { passes } => {
                // The search starts from the last inserted pass
                assert_eq!(passes, &["b", "a", "b"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
        assert!(err.to_string().starts_with("circular dependency detected"));
    }

    #[test]
    fn self_loop_is_not_an_edge() {
        // A pass reading and writing the same image does not depend on itself
        let h = RenderImageHandle(0);
        let mut solver = GraphSolver::new();
        solver.import_image(TextureUsage::external(h, vk::ImageLayout::GENERAL));
        solver.add_node(pass(
            "in_place",
            RenderPassIo::new()
                .read(TextureUsage::compute_sampled(h))
                .write(TextureUsage::compute_storage_write(h)),
        ));

        assert_eq!(solver.solve().unwrap().len(), 1);
    }

    #[test]
    fn multiple_writers_are_rejected() {
        let mut solver = GraphSolver::new();
        solver.add_node(shadow());
        solver.add_node(pass(
            "second_shadow",
            RenderPassIo::new().write(TextureUsage::depth_attachment_write(SHADOW)),
        ));

        assert!(matches!(
            solver.solve(),
            Err(GraphError::MultipleWriters { handle: SHADOW, .. })
        ));
    }

    #[test]
    fn read_without_writer_is_undefined() {
        let mut solver = GraphSolver::new();
        solver.add_node(opaque());

        let order = solver.solve().unwrap();
        let err = solver
            .create_image_barriers(&order, &AspectTable::new())
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::UndefinedLayout { handle: SHADOW, .. }
        ));
    }

    #[test]
    fn imported_image_seeds_layout() {
        let mut solver = GraphSolver::new();
        solver.import_image(TextureUsage::external(
            SHADOW,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ));
        solver.add_node(opaque());

        let order = solver.solve().unwrap();
        let barriers = solver
            .create_image_barriers(&order, &AspectTable::new())
            .unwrap();
        assert_eq!(barriers[0].len(), 1);
        assert_eq!(barriers[0][0].old_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(barriers[0][0].src_access, vk::AccessFlags2::MEMORY_WRITE);
        assert!(!barriers[0][0].is_layout_transition());
    }

    #[test]
    fn every_reader_gets_one_barrier_in_declaration_order() {
        let a = RenderImageHandle(0);
        let b = RenderImageHandle(1);
        let mut solver = GraphSolver::new();
        solver.add_node(pass(
            "producer",
            RenderPassIo::new()
                .write(TextureUsage::color_attachment_write(a))
                .write(TextureUsage::color_attachment_write(b)),
        ));
        solver.add_node(pass(
            "reader_one",
            RenderPassIo::new()
                .read(TextureUsage::fragment_sampled(b))
                .read(TextureUsage::fragment_sampled(a))
                .read(TextureUsage::fragment_sampled(b)),
        ));
        solver.add_node(pass(
            "reader_two",
            RenderPassIo::new().read(TextureUsage::compute_sampled(a)),
        ));

        let order = solver.solve().unwrap();
        let barriers = solver
            .create_image_barriers(&order, &AspectTable::new())
            .unwrap();

        // Duplicate declaration of `b` yields a single barrier
        let handles: Vec<_> = barriers[1].iter().map(|b| b.handle).collect();
        assert_eq!(handles, [b, a]);

        // The second reader syncs against the writer, from the current layout
        assert_eq!(barriers[2].len(), 1);
        assert_eq!(barriers[2][0].src_stage, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(barriers[2][0].old_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(barriers[2][0].dst_stage, vk::PipelineStageFlags2::COMPUTE_SHADER);
    }

    #[test]
    fn clear_invalidates_ids() {
        let mut solver = GraphSolver::new();
        let id = solver.add_node(shadow());
        assert!(solver.pass(id).is_ok());

        solver.clear();
        assert!(solver.is_empty());
        assert!(matches!(solver.pass(id), Err(GraphError::StalePass { .. })));

        let fresh = solver.add_node(shadow());
        assert_eq!(fresh.index(), id.index());
        assert_ne!(fresh, id);
    }

    #[test]
    fn empty_graph_solves_to_nothing() {
        let solver = GraphSolver::new();
        assert!(solver.solve().unwrap().is_empty());
        assert!(solver
            .create_image_barriers(&[], &AspectTable::new())
            .unwrap()
            .is_empty());
    }
}
