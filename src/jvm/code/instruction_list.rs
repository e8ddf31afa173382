use super::{
    AnyInstruction, BranchInstruction, CodeExceptionGen, InstructionHandle, LineNumberGen,
    LocalVariableGen, TargetLost, Targeter,
};
use crate::jvm::class_file::{ConstantLookup, Serialize};
use crate::jvm::model::{Observer, ObserverId, Observers};
use crate::jvm::{ConstantPoolGen, Error};
use std::collections::{HashMap, HashSet};
use std::convert::TryFrom;
use std::fmt;

/// One instruction in the list, along with its links and bookkeeping
#[derive(Debug)]
struct Node {
    instruction: AnyInstruction,
    prev: Option<InstructionHandle>,
    next: Option<InstructionHandle>,

    /// Byte offset from the start of the code (only meaningful once positions are resolved)
    position: Option<usize>,

    /// Everything currently referring to this instruction (with repeats)
    targeters: Vec<Targeter>,
}

/// Mutable sequence of instructions, addressed through handles
///
/// The list is doubly linked, so inserting, moving, or deleting instructions (or whole other
/// lists) is cheap and never invalidates handles to the instructions which stay. Every
/// instruction keeps track of what targets it: branches, exception handlers, local variable
/// ranges, and line numbers. This is what lets deletion refuse to leave a jump dangling.
///
/// Byte offsets are only computed on demand, by [`InstructionList::set_positions`] (which also
/// picks between short and wide `goto`/`jsr` and pads switches). Afterwards, positions are stale
/// as soon as the list is modified.
#[derive(Debug, Default)]
pub struct InstructionList {
    nodes: HashMap<InstructionHandle, Node>,
    start: Option<InstructionHandle>,
    end: Option<InstructionHandle>,

    /// Instruction offsets, in order, as of the last position resolution
    byte_positions: Vec<usize>,

    /// Targeters registered on handles which are not (yet) in this list
    ///
    /// These get attached when the handle joins the list, either through
    /// [`InstructionList::append_with_handle`] or by splicing in the list holding it.
    pending: HashMap<InstructionHandle, Vec<Targeter>>,

    observers: Observers<InstructionList>,
}

impl InstructionList {
    pub fn new() -> InstructionList {
        InstructionList::default()
    }

    /// Append an instruction to the end of the list
    pub fn append(&mut self, instruction: impl Into<AnyInstruction>) -> InstructionHandle {
        let handle = InstructionHandle::fresh();
        self.insert_node(handle, instruction.into(), self.end);
        handle
    }

    /// Append an instruction to the end of the list, using a handle minted ahead of time
    ///
    /// Anything which targeted the handle while it was not in the list now targets the
    /// instruction.
    pub fn append_with_handle(
        &mut self,
        handle: InstructionHandle,
        instruction: impl Into<AnyInstruction>,
    ) -> Result<(), Error> {
        if self.nodes.contains_key(&handle) {
            return Err(Error::NegativeOrInvalidArgument(format!(
                "{:?} is already in the list",
                handle
            )));
        }
        self.insert_node(handle, instruction.into(), self.end);
        Ok(())
    }

    /// Insert an instruction at the start of the list
    pub fn insert(&mut self, instruction: impl Into<AnyInstruction>) -> InstructionHandle {
        let handle = InstructionHandle::fresh();
        self.insert_node(handle, instruction.into(), None);
        handle
    }

    /// Insert an instruction right after another one
    pub fn append_after(
        &mut self,
        after: InstructionHandle,
        instruction: impl Into<AnyInstruction>,
    ) -> Result<InstructionHandle, Error> {
        self.node(after)?;
        let handle = InstructionHandle::fresh();
        self.insert_node(handle, instruction.into(), Some(after));
        Ok(handle)
    }

    /// Insert an instruction right before another one
    pub fn insert_before(
        &mut self,
        before: InstructionHandle,
        instruction: impl Into<AnyInstruction>,
    ) -> Result<InstructionHandle, Error> {
        let after = self.node(before)?.prev;
        let handle = InstructionHandle::fresh();
        self.insert_node(handle, instruction.into(), after);
        Ok(handle)
    }

    /// Move all of the instructions of another list to the end of this one
    ///
    /// The other list is left empty. Returns the handle of the first instruction moved over.
    pub fn append_list(&mut self, other: &mut InstructionList) -> Option<InstructionHandle> {
        self.splice_list(self.end, other)
    }

    /// Move all of the instructions of another list to the start of this one
    pub fn insert_list(&mut self, other: &mut InstructionList) -> Option<InstructionHandle> {
        self.splice_list(None, other)
    }

    /// Move all of the instructions of another list to right after an instruction in this one
    pub fn append_list_after(
        &mut self,
        after: InstructionHandle,
        other: &mut InstructionList,
    ) -> Result<Option<InstructionHandle>, Error> {
        self.node(after)?;
        Ok(self.splice_list(Some(after), other))
    }

    /// Move all of the instructions of another list to right before an instruction in this one
    pub fn insert_list_before(
        &mut self,
        before: InstructionHandle,
        other: &mut InstructionList,
    ) -> Result<Option<InstructionHandle>, Error> {
        let after = self.node(before)?.prev;
        Ok(self.splice_list(after, other))
    }

    /// Move the instructions from `start` to `end` (inclusive) to after `target`
    ///
    /// When `target` is `None`, the range is moved to the start of the list. The target must not
    /// be inside the range.
    pub fn move_range(
        &mut self,
        start: InstructionHandle,
        end: InstructionHandle,
        target: Option<InstructionHandle>,
    ) -> Result<(), Error> {
        let range = self.range(start, end)?;
        if let Some(target) = target {
            self.node(target)?;
            if range.contains(&target) {
                return Err(Error::InvalidMove(target));
            }
        }
        self.unlink(start, end);
        self.link_after(target, start, end);
        Ok(())
    }

    /// Move a single instruction to after `target` (or to the start, if `target` is `None`)
    pub fn move_to(
        &mut self,
        handle: InstructionHandle,
        target: Option<InstructionHandle>,
    ) -> Result<(), Error> {
        self.move_range(handle, handle, target)
    }

    /// Delete one instruction
    pub fn delete(&mut self, handle: InstructionHandle) -> Result<(), Error> {
        self.delete_range(handle, handle)
    }

    /// Delete the instructions from `start` to `end` (inclusive)
    ///
    /// If anything outside the range still targets instructions in the range, nothing is
    /// deleted and the error lists every such instruction along with its targeters. The caller
    /// can redirect those and try again.
    pub fn delete_range(
        &mut self,
        start: InstructionHandle,
        end: InstructionHandle,
    ) -> Result<(), Error> {
        let range = self.range(start, end)?;
        let deleted: HashSet<InstructionHandle> = range.iter().copied().collect();

        let mut orphans = vec![];
        for handle in &range {
            let node = self.node(*handle)?;
            let outside: Vec<Targeter> = node
                .targeters
                .iter()
                .filter(|targeter| match targeter {
                    Targeter::Branch(branch) => !deleted.contains(branch),
                    _ => true,
                })
                .copied()
                .collect();
            if !outside.is_empty() {
                orphans.push((*handle, outside));
            }
        }
        if !orphans.is_empty() {
            return Err(Error::TargetLost(TargetLost { orphans }));
        }

        // Branches being deleted release their targets outside of the range
        for handle in &range {
            let targets = match self.node(*handle)?.instruction.as_branch() {
                Some(branch) => branch.targets(),
                None => continue,
            };
            for target in targets {
                if !deleted.contains(&target) {
                    self.unregister(target, Targeter::Branch(*handle));
                }
            }
        }

        self.unlink(start, end);
        for handle in &range {
            self.nodes.remove(handle);
        }
        log::trace!("Deleted {} instruction(s) from {:?}", range.len(), start);
        Ok(())
    }

    /// Compute byte offsets for every instruction
    ///
    /// This is also when `goto`/`jsr` instructions whose jump may not fit in 16 bits are widened
    /// into `goto_w`/`jsr_w`, and when switch padding is recomputed. Running this again without
    /// modifying the list in between changes nothing.
    ///
    /// With `check` set, every branch target is first checked to be in this list.
    pub fn set_positions(&mut self, check: bool) -> Result<(), Error> {
        let handles: Vec<InstructionHandle> = self.iter().collect();

        if check {
            for handle in &handles {
                if let Some(branch) = self.node(*handle)?.instruction.as_branch() {
                    for target in branch.targets() {
                        if !self.nodes.contains_key(&target) {
                            return Err(Error::BranchTargetNotInList {
                                branch: *handle,
                                target,
                            });
                        }
                    }
                }
            }
        }

        // Tentative positions, along with the most the code could grow by
        let mut position = 0;
        let mut max_additional: usize = 0;
        for handle in &handles {
            let node = self.node_mut(*handle)?;
            node.position = Some(position);
            position += node.instruction.length();
            match &node.instruction {
                AnyInstruction::Branch(BranchInstruction::Goto(_))
                | AnyInstruction::Branch(BranchInstruction::Jsr(_)) => max_additional += 2,
                AnyInstruction::Branch(branch) if branch.is_switch() => max_additional += 3,
                _ => (),
            }
        }

        // Shift positions for growth so far, and let branches adjust their encodings
        let mut additional: isize = 0;
        for handle in &handles {
            let node = self.node(*handle)?;
            let old_position = node.position.unwrap_or(0);
            let new_position = (old_position as isize + additional) as usize;

            let jump_offset = match &node.instruction {
                AnyInstruction::Branch(branch @ BranchInstruction::Goto(_))
                | AnyInstruction::Branch(branch @ BranchInstruction::Jsr(_)) => {
                    let target = branch.target();
                    let target_position = self
                        .nodes
                        .get(&target)
                        .and_then(|node| node.position)
                        .ok_or(Error::UnresolvedPosition(target))?;
                    Some(target_position as isize - old_position as isize)
                }
                _ => None,
            };

            let node = self.node_mut(*handle)?;
            node.position = Some(new_position);
            if let AnyInstruction::Branch(branch) = &mut node.instruction {
                if let Some(offset) = jump_offset {
                    if offset.abs() >= i16::MAX as isize - max_additional as isize
                        && branch.widen()
                    {
                        log::trace!(
                            "Widening {:?} at {} to {} (offset {})",
                            handle,
                            new_position,
                            branch.name(),
                            offset
                        );
                        additional += 2;
                    }
                }
                additional += branch.update_padding(new_position);
            }
        }

        // Final positions
        let mut position = 0;
        self.byte_positions.clear();
        for handle in &handles {
            let node = self.node_mut(*handle)?;
            node.position = Some(position);
            let length = node.instruction.length();
            self.byte_positions.push(position);
            position += length;
        }
        log::trace!(
            "Resolved positions of {} instructions ({} bytes)",
            handles.len(),
            position
        );

        Ok(())
    }

    /// Resolve positions and encode the whole list
    pub fn byte_code(&mut self) -> Result<Vec<u8>, Error> {
        self.set_positions(false)?;

        let mut bytes = vec![];
        for handle in self.iter() {
            let node = self.node(handle)?;
            match &node.instruction {
                AnyInstruction::Plain(instruction) => instruction.serialize(&mut bytes)?,
                AnyInstruction::Branch(branch) => {
                    let position = node.position.ok_or(Error::UnresolvedPosition(handle))?;
                    let resolved = branch.try_map_targets(|target| {
                        let offset = self.position(*target)? as isize - position as isize;
                        i32::try_from(offset).map_err(|_| Error::BranchOffsetOverflow {
                            branch: handle,
                            offset,
                        })
                    })?;
                    let short_offset = match resolved {
                        BranchInstruction::GotoW(_)
                        | BranchInstruction::JsrW(_)
                        | BranchInstruction::TableSwitch { .. }
                        | BranchInstruction::LookupSwitch { .. } => None,
                        _ => Some(resolved.target()),
                    };
                    if let Some(offset) = short_offset {
                        if i16::try_from(offset).is_err() {
                            return Err(Error::BranchOffsetOverflow {
                                branch: handle,
                                offset: offset as isize,
                            });
                        }
                    }
                    resolved.serialize(&mut bytes)?;
                }
            }
        }
        Ok(bytes)
    }

    /// Like [`InstructionList::byte_code`], but logging failures and producing empty code
    pub fn byte_code_or_empty(&mut self) -> Vec<u8> {
        match self.byte_code() {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("Failed to encode instruction list: {}", err);
                vec![]
            }
        }
    }

    /// Offsets of the instructions, as of the last time positions were resolved
    pub fn instruction_positions(&self) -> &[usize] {
        &self.byte_positions
    }

    /// Find the instruction at a byte offset
    pub fn find_handle(&self, position: usize) -> Option<InstructionHandle> {
        self.iter()
            .find(|handle| self.nodes.get(handle).and_then(|node| node.position) == Some(position))
    }

    /// Deep copy of the list, with fresh handles
    ///
    /// Branches between instructions in the list are remapped to the corresponding copies.
    /// Branches to instructions outside of the list keep their targets. Other targeters (exception
    /// handlers, local variables, line numbers) are not copied.
    pub fn copy(&self) -> InstructionList {
        let mapping: HashMap<InstructionHandle, InstructionHandle> = self
            .iter()
            .map(|handle| (handle, InstructionHandle::fresh()))
            .collect();

        let mut copied = InstructionList::new();
        for handle in self.iter() {
            let node = match self.nodes.get(&handle) {
                Some(node) => node,
                None => continue,
            };
            let instruction = match &node.instruction {
                AnyInstruction::Plain(instruction) => AnyInstruction::Plain(*instruction),
                AnyInstruction::Branch(branch) => AnyInstruction::Branch(
                    branch.map_targets(|target| *mapping.get(target).unwrap_or(target)),
                ),
            };
            if let Some(new_handle) = mapping.get(&handle) {
                copied.insert_node(*new_handle, instruction, copied.end);
            }
        }
        copied
    }

    /// Make every branch in the list which jumps to `old_target` jump to `new_target` instead
    pub fn redirect_branches(
        &mut self,
        old_target: InstructionHandle,
        new_target: InstructionHandle,
    ) {
        let handles: Vec<InstructionHandle> = self.iter().collect();
        for handle in handles {
            let replaced = match self
                .nodes
                .get_mut(&handle)
                .and_then(|node| node.instruction.as_branch_mut())
            {
                Some(branch) => branch.replace_target(old_target, new_target),
                None => continue,
            };
            for _ in 0..replaced {
                self.unregister(old_target, Targeter::Branch(handle));
                self.register(new_target, Targeter::Branch(handle));
            }
        }
    }

    /// Move the live ranges of local variables which start or end at `old_target`
    pub fn redirect_local_variables(
        &mut self,
        variables: &mut [LocalVariableGen],
        old_target: InstructionHandle,
        new_target: InstructionHandle,
    ) {
        for variable in variables {
            let targeter = variable.targeter();
            for bound in [&mut variable.start, &mut variable.end] {
                if *bound == Some(old_target) {
                    *bound = Some(new_target);
                    self.retarget(targeter, old_target, new_target);
                }
            }
        }
    }

    /// Move the ranges and entry points of exception handlers which refer to `old_target`
    pub fn redirect_exception_handlers(
        &mut self,
        handlers: &mut [CodeExceptionGen],
        old_target: InstructionHandle,
        new_target: InstructionHandle,
    ) {
        for handler in handlers {
            let targeter = handler.targeter();
            for bound in [&mut handler.start, &mut handler.end, &mut handler.handler] {
                if *bound == old_target {
                    *bound = new_target;
                    self.retarget(targeter, old_target, new_target);
                }
            }
        }
    }

    /// Move line numbers attached to `old_target`
    pub fn redirect_line_numbers(
        &mut self,
        line_numbers: &mut [LineNumberGen],
        old_target: InstructionHandle,
        new_target: InstructionHandle,
    ) {
        for line_number in line_numbers {
            if line_number.handle == old_target {
                line_number.handle = new_target;
                self.retarget(line_number.targeter(), old_target, new_target);
            }
        }
    }

    /// Replace the instruction held by a handle, returning the old instruction
    ///
    /// Plain instructions can only be replaced by plain instructions, and branches by branches.
    pub fn set_instruction(
        &mut self,
        handle: InstructionHandle,
        instruction: impl Into<AnyInstruction>,
    ) -> Result<AnyInstruction, Error> {
        let instruction = instruction.into();
        let node = self.node_mut(handle)?;
        if !node.instruction.same_kind(&instruction) {
            return Err(Error::IncompatibleHandleKind(handle));
        }
        let old = std::mem::replace(&mut node.instruction, instruction);

        if let AnyInstruction::Branch(branch) = &old {
            for target in branch.targets() {
                self.unregister(target, Targeter::Branch(handle));
            }
        }
        let new_targets = match self.node(handle)?.instruction.as_branch() {
            Some(branch) => branch.targets(),
            None => vec![],
        };
        for target in new_targets {
            self.register(target, Targeter::Branch(handle));
        }
        Ok(old)
    }

    /// Change the main target of a branch (the default target, for switches)
    ///
    /// Returns the previous target.
    pub fn set_branch_target(
        &mut self,
        handle: InstructionHandle,
        target: InstructionHandle,
    ) -> Result<InstructionHandle, Error> {
        let old_target = self
            .node_mut(handle)?
            .instruction
            .as_branch_mut()
            .ok_or(Error::IncompatibleHandleKind(handle))?
            .set_target(target);
        self.unregister(old_target, Targeter::Branch(handle));
        self.register(target, Targeter::Branch(handle));
        Ok(old_target)
    }

    /// Change the target of one case of a switch, returning the previous target
    pub fn set_switch_target(
        &mut self,
        handle: InstructionHandle,
        case: usize,
        target: InstructionHandle,
    ) -> Result<InstructionHandle, Error> {
        let old_target = self
            .node_mut(handle)?
            .instruction
            .as_branch_mut()
            .ok_or(Error::IncompatibleHandleKind(handle))?
            .set_case_target(case, target)
            .ok_or_else(|| {
                Error::NegativeOrInvalidArgument(format!(
                    "{:?} has no switch case {}",
                    handle, case
                ))
            })?;
        self.unregister(old_target, Targeter::Branch(handle));
        self.register(target, Targeter::Branch(handle));
        Ok(old_target)
    }

    /// Everything targeting a handle
    pub fn targeters(&self, handle: InstructionHandle) -> &[Targeter] {
        if let Some(node) = self.nodes.get(&handle) {
            &node.targeters
        } else if let Some(targeters) = self.pending.get(&handle) {
            targeters
        } else {
            &[]
        }
    }

    pub fn has_targeters(&self, handle: InstructionHandle) -> bool {
        !self.targeters(handle).is_empty()
    }

    /// Register a targeter on a handle (which need not be in the list yet)
    pub fn add_targeter(&mut self, handle: InstructionHandle, targeter: Targeter) {
        self.register(handle, targeter);
    }

    /// Remove one occurrence of a targeter from a handle, returning whether it was there
    pub fn remove_targeter(&mut self, handle: InstructionHandle, targeter: Targeter) -> bool {
        self.unregister(handle, targeter)
    }

    pub fn contains(&self, handle: InstructionHandle) -> bool {
        self.nodes.contains_key(&handle)
    }

    /// Iterate over the handles in order
    pub fn iter(&self) -> Handles<'_> {
        Handles {
            list: self,
            next: self.start,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn start(&self) -> Option<InstructionHandle> {
        self.start
    }

    pub fn end(&self) -> Option<InstructionHandle> {
        self.end
    }

    pub fn next(&self, handle: InstructionHandle) -> Result<Option<InstructionHandle>, Error> {
        Ok(self.node(handle)?.next)
    }

    pub fn prev(&self, handle: InstructionHandle) -> Result<Option<InstructionHandle>, Error> {
        Ok(self.node(handle)?.prev)
    }

    pub fn instruction(&self, handle: InstructionHandle) -> Result<&AnyInstruction, Error> {
        Ok(&self.node(handle)?.instruction)
    }

    /// Byte offset of an instruction, as of the last position resolution
    pub fn position(&self, handle: InstructionHandle) -> Result<usize, Error> {
        self.node(handle)?
            .position
            .ok_or(Error::UnresolvedPosition(handle))
    }

    /// Remove every instruction (and all targeter bookkeeping) from the list
    pub fn dispose(&mut self) {
        self.nodes.clear();
        self.pending.clear();
        self.byte_positions.clear();
        self.start = None;
        self.end = None;
    }

    /// Copy of the instructions, in order
    pub fn instructions(&self) -> Vec<AnyInstruction> {
        self.iter()
            .filter_map(|handle| self.nodes.get(&handle))
            .map(|node| node.instruction.clone())
            .collect()
    }

    /// Re-point every constant pool operand from one pool to another
    ///
    /// Referenced constants (and their dependencies) get added to the new pool as needed.
    pub fn replace_constant_pool(
        &mut self,
        from: &impl ConstantLookup,
        to: &mut ConstantPoolGen,
    ) -> Result<(), Error> {
        for node in self.nodes.values_mut() {
            if let AnyInstruction::Plain(instruction) = &mut node.instruction {
                if let Some(index) = instruction.cp_index() {
                    let imported = to.import_constant(index, from)?;
                    *instruction = instruction.with_cp_index(imported);
                }
            }
        }
        Ok(())
    }

    pub fn add_observer(
        &mut self,
        observer: impl Observer<InstructionList> + 'static,
    ) -> ObserverId {
        self.observers.add(observer)
    }

    pub fn remove_observer(&mut self, observer: ObserverId) -> bool {
        self.observers.remove(observer)
    }

    /// Notify all observers
    pub fn update(&mut self) {
        let mut observers = std::mem::take(&mut self.observers);
        observers.notify_all(self);
        self.observers = observers;
    }

    fn node(&self, handle: InstructionHandle) -> Result<&Node, Error> {
        self.nodes.get(&handle).ok_or(Error::NotInList(handle))
    }

    fn node_mut(&mut self, handle: InstructionHandle) -> Result<&mut Node, Error> {
        self.nodes.get_mut(&handle).ok_or(Error::NotInList(handle))
    }

    /// Add a new node after `after` (or at the start), wiring up targeters in both directions
    pub(super) fn insert_node(
        &mut self,
        handle: InstructionHandle,
        instruction: AnyInstruction,
        after: Option<InstructionHandle>,
    ) {
        let targets = match &instruction {
            AnyInstruction::Branch(branch) => branch.targets(),
            AnyInstruction::Plain(_) => vec![],
        };
        let node = Node {
            instruction,
            prev: None,
            next: None,
            position: None,
            targeters: self.pending.remove(&handle).unwrap_or_default(),
        };
        self.nodes.insert(handle, node);
        self.link_after(after, handle, handle);
        for target in targets {
            self.register(target, Targeter::Branch(handle));
        }
    }

    /// Set the position of a node directly (used when decoding existing bytecode)
    pub(super) fn set_position(&mut self, handle: InstructionHandle, position: usize) {
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.position = Some(position);
        }
        self.byte_positions.push(position);
    }

    fn splice_list(
        &mut self,
        after: Option<InstructionHandle>,
        other: &mut InstructionList,
    ) -> Option<InstructionHandle> {
        let pending = std::mem::take(&mut other.pending);
        let first = match (other.start.take(), other.end.take()) {
            (Some(first), Some(last)) => {
                self.nodes.extend(other.nodes.drain());
                other.byte_positions.clear();
                self.link_after(after, first, last);
                Some(first)
            }
            _ => None,
        };

        for (target, targeters) in pending {
            for targeter in targeters {
                self.register(target, targeter);
            }
        }
        let resolved: Vec<InstructionHandle> = self
            .pending
            .keys()
            .filter(|handle| self.nodes.contains_key(handle))
            .copied()
            .collect();
        for handle in resolved {
            if let (Some(targeters), Some(node)) =
                (self.pending.remove(&handle), self.nodes.get_mut(&handle))
            {
                node.targeters.extend(targeters);
            }
        }

        first
    }

    /// Handles from `start` to `end`, inclusive
    fn range(
        &self,
        start: InstructionHandle,
        end: InstructionHandle,
    ) -> Result<Vec<InstructionHandle>, Error> {
        self.node(end)?;
        let mut range = vec![];
        let mut current = Some(start);
        while let Some(handle) = current {
            range.push(handle);
            if handle == end {
                return Ok(range);
            }
            current = self.node(handle)?.next;
        }
        Err(Error::NegativeOrInvalidArgument(format!(
            "{:?} does not come after {:?}",
            end, start
        )))
    }

    /// Link the already internally linked chain `first..=last` after `after`
    fn link_after(
        &mut self,
        after: Option<InstructionHandle>,
        first: InstructionHandle,
        last: InstructionHandle,
    ) {
        let next = match after {
            Some(after) => self.nodes.get(&after).and_then(|node| node.next),
            None => self.start,
        };
        if let Some(node) = self.nodes.get_mut(&first) {
            node.prev = after;
        }
        if let Some(node) = self.nodes.get_mut(&last) {
            node.next = next;
        }
        match after.and_then(|after| self.nodes.get_mut(&after)) {
            Some(node) => node.next = Some(first),
            None => self.start = Some(first),
        }
        match next.and_then(|next| self.nodes.get_mut(&next)) {
            Some(node) => node.prev = Some(last),
            None => self.end = Some(last),
        }
    }

    /// Detach the chain `first..=last` from its neighbours (the nodes stay in the map)
    fn unlink(&mut self, first: InstructionHandle, last: InstructionHandle) {
        let prev = self.nodes.get(&first).and_then(|node| node.prev);
        let next = self.nodes.get(&last).and_then(|node| node.next);
        match prev.and_then(|prev| self.nodes.get_mut(&prev)) {
            Some(node) => node.next = next,
            None => self.start = next,
        }
        match next.and_then(|next| self.nodes.get_mut(&next)) {
            Some(node) => node.prev = prev,
            None => self.end = prev,
        }
        if let Some(node) = self.nodes.get_mut(&first) {
            node.prev = None;
        }
        if let Some(node) = self.nodes.get_mut(&last) {
            node.next = None;
        }
    }

    fn register(&mut self, target: InstructionHandle, targeter: Targeter) {
        match self.nodes.get_mut(&target) {
            Some(node) => node.targeters.push(targeter),
            None => self.pending.entry(target).or_default().push(targeter),
        }
    }

    fn unregister(&mut self, target: InstructionHandle, targeter: Targeter) -> bool {
        fn remove_one(targeters: &mut Vec<Targeter>, targeter: Targeter) -> bool {
            match targeters.iter().position(|t| *t == targeter) {
                Some(idx) => {
                    targeters.remove(idx);
                    true
                }
                None => false,
            }
        }

        if let Some(node) = self.nodes.get_mut(&target) {
            remove_one(&mut node.targeters, targeter)
        } else if let Some(targeters) = self.pending.get_mut(&target) {
            let removed = remove_one(targeters, targeter);
            if targeters.is_empty() {
                self.pending.remove(&target);
            }
            removed
        } else {
            false
        }
    }

    fn retarget(
        &mut self,
        targeter: Targeter,
        old_target: InstructionHandle,
        new_target: InstructionHandle,
    ) {
        self.unregister(old_target, targeter);
        self.register(new_target, targeter);
    }
}

/// Iterator over the handles of an instruction list, in order
pub struct Handles<'a> {
    list: &'a InstructionList,
    next: Option<InstructionHandle>,
}

impl<'a> Iterator for Handles<'a> {
    type Item = InstructionHandle;

    fn next(&mut self) -> Option<InstructionHandle> {
        let current = self.next?;
        self.next = self.list.nodes.get(&current).and_then(|node| node.next);
        Some(current)
    }
}

impl<'a> IntoIterator for &'a InstructionList {
    type Item = InstructionHandle;
    type IntoIter = Handles<'a>;

    fn into_iter(self) -> Handles<'a> {
        self.iter()
    }
}

/// One instruction per line, prefixed with its position (when known)
impl fmt::Display for InstructionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |handle: &InstructionHandle| match self.nodes.get(handle).and_then(|n| n.position)
        {
            Some(position) => position.to_string(),
            None => format!("{:?}", handle),
        };
        for handle in self.iter() {
            let node = match self.nodes.get(&handle) {
                Some(node) => node,
                None => continue,
            };
            write!(f, "{:>6}: {}", show(&handle), node.instruction.name())?;
            if let AnyInstruction::Branch(branch) = &node.instruction {
                let targets: Vec<String> = branch.targets().iter().map(show).collect();
                write!(f, " -> {}", targets.join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{Instruction, OrdComparison};

    fn handles(list: &InstructionList) -> Vec<InstructionHandle> {
        list.iter().collect()
    }

    #[test]
    fn linking() {
        let mut list = InstructionList::new();
        let b = list.append(Instruction::IConst1);
        let a = list.insert(Instruction::IConst0);
        let d = list.append(Instruction::IReturn);
        let c = list.insert_before(d, Instruction::IAdd).unwrap();
        assert_eq!(handles(&list), vec![a, b, c, d]);
        assert_eq!(list.start(), Some(a));
        assert_eq!(list.end(), Some(d));
        assert_eq!(list.prev(c).unwrap(), Some(b));
        assert_eq!(list.next(d).unwrap(), None);

        list.move_range(b, c, None).unwrap();
        assert_eq!(handles(&list), vec![b, c, a, d]);
        assert!(matches!(
            list.move_range(b, a, Some(c)),
            Err(Error::InvalidMove(_))
        ));
        list.move_to(b, Some(d)).unwrap();
        assert_eq!(handles(&list), vec![c, a, d, b]);
        assert_eq!(list.end(), Some(b));
    }

    #[test]
    fn splicing_lists() {
        let mut list = InstructionList::new();
        let first = list.append(Instruction::Nop);
        let last = list.append(Instruction::Return);

        let mut middle = InstructionList::new();
        let x = middle.append(Instruction::IConst2);
        let y = middle.append(Instruction::Pop);
        assert_eq!(list.append_list_after(first, &mut middle).unwrap(), Some(x));
        assert!(middle.is_empty());
        assert_eq!(middle.start(), None);
        assert_eq!(handles(&list), vec![first, x, y, last]);

        let mut front = InstructionList::new();
        let z = front.append(Instruction::Nop);
        list.insert_list(&mut front);
        assert_eq!(list.start(), Some(z));
        assert_eq!(list.len(), 5);
    }

    #[test]
    fn forward_targets_get_adopted() {
        let mut list = InstructionList::new();
        let label = InstructionHandle::fresh();
        let jump = list.append(BranchInstruction::Goto(label));
        assert_eq!(list.targeters(label), &[Targeter::Branch(jump)]);
        assert!(matches!(
            list.set_positions(true),
            Err(Error::BranchTargetNotInList { .. })
        ));

        list.append_with_handle(label, Instruction::Return).unwrap();
        assert!(list.contains(label));
        assert_eq!(list.targeters(label), &[Targeter::Branch(jump)]);
        assert!(list.append_with_handle(label, Instruction::Nop).is_err());
        assert_eq!(list.byte_code().unwrap(), vec![0xa7, 0x00, 0x03, 0xb1]);
    }

    #[test]
    fn targeters_follow_retargeting() {
        let mut list = InstructionList::new();
        let a = list.append(Instruction::Nop);
        let b = list.append(Instruction::Nop);
        let jump = list.append(BranchInstruction::If(OrdComparison::EQ, a));
        list.set_branch_target(jump, b).unwrap();
        assert!(!list.has_targeters(a));
        assert_eq!(list.targeters(b), &[Targeter::Branch(jump)]);

        list.redirect_branches(b, a);
        assert_eq!(list.targeters(a), &[Targeter::Branch(jump)]);
        assert!(!list.has_targeters(b));

        assert!(matches!(
            list.set_instruction(jump, Instruction::Nop),
            Err(Error::IncompatibleHandleKind(_))
        ));
        list.set_instruction(jump, BranchInstruction::Goto(b)).unwrap();
        assert_eq!(list.targeters(b), &[Targeter::Branch(jump)]);
        assert!(!list.has_targeters(a));
    }

    #[test]
    fn deleting_targets_fails() {
        let mut list = InstructionList::new();
        let target = list.append(Instruction::Nop);
        let jump = list.append(BranchInstruction::Goto(target));
        let other = list.append(Instruction::Return);

        match list.delete(target) {
            Err(Error::TargetLost(lost)) => {
                assert_eq!(lost.orphans, vec![(target, vec![Targeter::Branch(jump)])]);
            }
            other => panic!("Expected lost targets, got {:?}", other),
        }
        assert_eq!(handles(&list), vec![target, jump, other]);

        // Deleting the jump along with its target is fine
        list.delete_range(target, jump).unwrap();
        assert_eq!(handles(&list), vec![other]);
        assert!(!list.has_targeters(target));
    }

    #[test]
    fn switch_padding_shifts_positions() {
        let mut list = InstructionList::new();
        let load = list.append(Instruction::ILoad(1));
        let ret = InstructionHandle::fresh();
        let switch = list.append(BranchInstruction::lookup_switch(vec![(3, ret)], ret));
        list.append_with_handle(ret, Instruction::Return).unwrap();

        list.set_positions(true).unwrap();
        assert_eq!(list.position(load).unwrap(), 0);
        assert_eq!(list.position(switch).unwrap(), 1);
        // 1 opcode byte at 1, then 2 bytes to reach 4, then default + npairs + 1 pair
        assert_eq!(list.position(ret).unwrap(), 1 + 1 + 2 + 8 + 8);
        assert_eq!(list.instruction_positions(), &[0, 1, 20]);
        assert_eq!(list.find_handle(20), Some(ret));
        assert_eq!(list.find_handle(2), None);
    }

    #[test]
    fn copies_are_independent() {
        let mut list = InstructionList::new();
        let top = list.append(Instruction::Nop);
        list.append(BranchInstruction::Goto(top));

        let mut copy = list.copy();
        assert_eq!(copy.len(), 2);
        let copied_top = copy.start().unwrap();
        let copied_jump = copy.end().unwrap();
        assert_ne!(copied_top, top);
        assert_eq!(
            copy.instruction(copied_jump).unwrap(),
            &AnyInstruction::Branch(BranchInstruction::Goto(copied_top))
        );
        assert_eq!(copy.targeters(copied_top), &[Targeter::Branch(copied_jump)]);
        assert_eq!(copy.byte_code().unwrap(), list.byte_code().unwrap());
    }

    #[test]
    fn observers_see_updates() {
        use std::cell::Cell;
        use std::rc::Rc;

        let seen = Rc::new(Cell::new(0));
        let mut list = InstructionList::new();
        let seen_inner = seen.clone();
        let id = list.add_observer(move |list: &InstructionList| seen_inner.set(list.len()));
        list.append(Instruction::Nop);
        assert_eq!(seen.get(), 0);
        list.update();
        assert_eq!(seen.get(), 1);
        assert!(list.remove_observer(id));
        list.append(Instruction::Nop);
        list.update();
        assert_eq!(seen.get(), 1);
    }
}
