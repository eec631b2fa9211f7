use crate::layout::cmd::{CmdType, RepLayoutCmd};

/// Maps a relative handle (its position plus one) to a command index. Dynamic
/// arrays carry the table for one of their elements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandleToCmdIndex {
    pub cmd_index: usize,
    pub sub_table: Option<Vec<HandleToCmdIndex>>,
}

pub(crate) fn build_handle_table(
    cmds: &[RepLayoutCmd],
    cmd_start: usize,
    cmd_end: usize,
) -> Vec<HandleToCmdIndex> {
    let mut table = Vec::new();
    let mut cmd_index = cmd_start;
    while cmd_index < cmd_end {
        let cmd = &cmds[cmd_index];
        if cmd.cmd_type == CmdType::DynamicArray {
            table.push(HandleToCmdIndex {
                cmd_index,
                sub_table: Some(build_handle_table(cmds, cmd_index + 1, cmd.end_cmd - 1)),
            });
            cmd_index = cmd.end_cmd;
        } else {
            table.push(HandleToCmdIndex {
                cmd_index,
                sub_table: None,
            });
            cmd_index += 1;
        }
    }
    table
}
