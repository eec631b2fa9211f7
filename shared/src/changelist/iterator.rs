use log::warn;

use crate::layout::{CmdType, HandleToCmdIndex, Layout, RepLayoutCmd};

/// Read position within a changelist. Reading past the end yields the
/// terminator.
pub(crate) struct ChangelistCursor<'c> {
    changed: &'c [u16],
    index: usize,
}

/// Where an array's inner changelist starts and how many entries it holds.
pub(crate) struct ArrayMark {
    start: usize,
    count: usize,
}

impl<'c> ChangelistCursor<'c> {
    pub fn new(changed: &'c [u16]) -> Self {
        Self { changed, index: 0 }
    }

    pub fn peek(&self) -> u16 {
        self.changed.get(self.index).copied().unwrap_or(0)
    }

    pub fn advance(&mut self) -> u16 {
        let value = self.peek();
        if self.index < self.changed.len() {
            self.index += 1;
        }
        value
    }

    /// Consumes the jump count that follows an array handle.
    pub fn enter_array(&mut self) -> ArrayMark {
        let count = usize::from(self.advance());
        ArrayMark {
            start: self.index,
            count,
        }
    }

    /// Moves past an array's inner entries and its terminator.
    pub fn leave_array(&mut self, mark: ArrayMark) {
        self.index = (mark.start + mark.count).min(self.changed.len());
        if self.peek() != 0 {
            warn!(
                "Changelist array at {} is not terminated where its jump count says",
                mark.start
            );
        }
        self.advance();
    }

    /// The inner entries of an array, as copied verbatim by the filters.
    pub fn array_entries(&self, mark: &ArrayMark) -> &'c [u16] {
        let end = (mark.start + mark.count).min(self.changed.len());
        &self.changed[mark.start.min(end)..end]
    }
}

/// Walks a changelist level, translating each handle into a command index
/// and array element.
pub(crate) struct HandleIterator<'a> {
    pub cmds: &'a [RepLayoutCmd],
    table: &'a [HandleToCmdIndex],
    in_array: bool,
    max_array_index: usize,
    min_cmd: usize,
    max_cmd: usize,
    pub handle: u16,
    pub cmd_index: usize,
    pub array_index: usize,
}

impl<'a> HandleIterator<'a> {
    pub fn top_level(layout: &'a Layout) -> Self {
        Self {
            cmds: layout.cmds(),
            table: layout.handle_table(),
            in_array: false,
            max_array_index: 1,
            min_cmd: 0,
            max_cmd: layout.top_level_end(),
            handle: 0,
            cmd_index: 0,
            array_index: 0,
        }
    }

    /// Iterator over the elements of the array command `cmd_index`, which
    /// must be a command this iterator produced.
    pub fn for_array(&self, cmd_index: usize, num_elements: usize) -> HandleIterator<'a> {
        let cmd = &self.cmds[cmd_index];
        let table = usize::from(cmd.relative_handle)
            .checked_sub(1)
            .and_then(|index| self.table.get(index))
            .and_then(|entry| entry.sub_table.as_deref())
            .unwrap_or(&[]);
        HandleIterator {
            cmds: self.cmds,
            table,
            in_array: true,
            max_array_index: num_elements,
            min_cmd: cmd_index + 1,
            max_cmd: cmd.end_cmd.saturating_sub(1),
            handle: 0,
            cmd_index: 0,
            array_index: 0,
        }
    }

    pub fn num_handles_per_element(&self) -> usize {
        self.table.len()
    }

    /// Advances to the next handle. Returns false at the terminator or when
    /// the handle falls outside the current bounds.
    pub fn next_handle(&mut self, cursor: &mut ChangelistCursor) -> bool {
        let handle = cursor.peek();
        if handle == 0 {
            return false;
        }
        cursor.advance();
        self.handle = handle;

        let per_element = self.table.len();
        if per_element == 0 {
            return false;
        }
        let handle_minus_one = usize::from(handle) - 1;
        self.array_index = if self.in_array {
            handle_minus_one / per_element
        } else {
            0
        };
        if self.array_index >= self.max_array_index {
            return false;
        }

        let relative = handle_minus_one - self.array_index * per_element;
        let Some(entry) = self.table.get(relative) else {
            warn!("Handle {} has no command (relative handle {})", handle, relative);
            return false;
        };
        if entry.cmd_index < self.min_cmd || entry.cmd_index >= self.max_cmd {
            warn!(
                "Handle {} maps to command {} outside {}..{}",
                handle, entry.cmd_index, self.min_cmd, self.max_cmd
            );
            return false;
        }
        if self.cmds[entry.cmd_index].cmd_type == CmdType::Return {
            return false;
        }
        self.cmd_index = entry.cmd_index;
        true
    }
}
