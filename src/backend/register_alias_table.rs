use crate::instructions::instructions::{NO_TAG, RegisterType, Tag};

pub struct RATEntry {
    // the rob tag of the youngest in-flight writer; NO_TAG if the arch register holds the value
    pub(crate) tag: Tag,
}

/// The Register Alias Table. This structure is used for the register
/// renaming process. The RAT entry for a given architectural register
/// points to the reorder buffer slot that will produce its value. As long
/// as such an entry exists, consumers wait on that tag instead of reading
/// the architectural register file.
pub(crate) struct RAT {
    pub(crate) table: Vec<RATEntry>,
}

impl RAT {
    pub fn new(arch_reg_count: u16) -> Self {
        let mut table = Vec::with_capacity(arch_reg_count as usize);
        for _ in 0..arch_reg_count {
            table.push(RATEntry { tag: NO_TAG });
        }
        Self { table }
    }

    pub fn get(&self, arch_reg: RegisterType) -> Tag {
        self.table[arch_reg as usize].tag
    }

    pub fn set(&mut self, arch_reg: RegisterType, tag: Tag) {
        debug_assert!(tag != NO_TAG, "RAT: can't rename F{} to the empty tag", arch_reg);
        self.table[arch_reg as usize].tag = tag;
    }

    /// Clears the entry, but only when it still belongs to `tag`. A younger
    /// writer of the same register keeps its claim.
    pub fn clear(&mut self, arch_reg: RegisterType, tag: Tag) -> bool {
        let entry = &mut self.table[arch_reg as usize];
        if entry.tag == tag {
            entry.tag = NO_TAG;
            true
        } else {
            false
        }
    }

    // (register, tag) for every register with an outstanding writer
    pub fn pending(&self) -> impl Iterator<Item = (RegisterType, Tag)> + '_ {
        self.table
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.tag != NO_TAG)
            .map(|(reg, entry)| (reg as RegisterType, entry.tag))
    }
}
