use super::opcodes as op;
use super::visitor::{self as caps, Capability};
use super::{EqComparison, InstructionHandle, OrdComparison};
use crate::jvm::class_file::Serialize;
use crate::util::Width;
use byteorder::WriteBytesExt;
use std::convert::{Infallible, TryFrom};
use std::io::{Error as IoError, ErrorKind};

/// Branching JVM bytecode instruction
///
/// The type parameter abstracts over the representation of jump targets. While an instruction
/// is in an [`InstructionList`](super::InstructionList), targets are handles of other
/// instructions. Shortly before the final serialization step, they become signed offsets
/// relative to the position of the branch instruction itself.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BranchInstruction<Lbl = InstructionHandle> {
    If(OrdComparison, Lbl), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, Lbl), // covers `if_icmpeq`, `if_icmpne`, `if_icmplt`, ... `if_icmple`
    IfACmp(EqComparison, Lbl), // covers `if_acmpeq`, `if_acmpne`
    IfNull(EqComparison, Lbl), // covers `ifnull`, `ifnonnull`
    Goto(Lbl),
    GotoW(Lbl),
    Jsr(Lbl),
    JsrW(Lbl),
    TableSwitch {
        /// `default` must be at a multiple of four bytes from the start of the current method, so
        /// there must be a 0-3 inclusive byte padding
        padding: u8,

        /// Jump target if the argument is less than `low` or greater than
        /// `low + targets.len()`
        default: Lbl,

        /// Value associated with the first jump target
        low: i32,

        /// Jump targets
        targets: Vec<Lbl>,
    },
    LookupSwitch {
        /// `default` must be at a multiple of four bytes from the start of the current method, so
        /// there must be a 0-3 inclusive byte padding
        padding: u8,

        /// Jump target if there is no corresponding key
        default: Lbl,

        /// Jump targets (sorted so that the keys are ascending)
        targets: Vec<(i32, Lbl)>,
    },
}

impl<Lbl> BranchInstruction<Lbl> {
    /// Switch over a contiguous range of values starting at `low`
    ///
    /// The padding gets fixed up when positions in the instruction list are resolved.
    pub fn table_switch(low: i32, targets: Vec<Lbl>, default: Lbl) -> BranchInstruction<Lbl> {
        BranchInstruction::TableSwitch {
            padding: 0,
            default,
            low,
            targets,
        }
    }

    /// Switch over arbitrary values (which should be in ascending order)
    pub fn lookup_switch(targets: Vec<(i32, Lbl)>, default: Lbl) -> BranchInstruction<Lbl> {
        BranchInstruction::LookupSwitch {
            padding: 0,
            default,
            targets,
        }
    }

    pub fn opcode(&self) -> u8 {
        match self {
            BranchInstruction::If(comp, _) => match comp {
                OrdComparison::EQ => op::IFEQ,
                OrdComparison::NE => op::IFNE,
                OrdComparison::LT => op::IFLT,
                OrdComparison::GE => op::IFGE,
                OrdComparison::GT => op::IFGT,
                OrdComparison::LE => op::IFLE,
            },
            BranchInstruction::IfICmp(comp, _) => match comp {
                OrdComparison::EQ => op::IF_ICMPEQ,
                OrdComparison::NE => op::IF_ICMPNE,
                OrdComparison::LT => op::IF_ICMPLT,
                OrdComparison::GE => op::IF_ICMPGE,
                OrdComparison::GT => op::IF_ICMPGT,
                OrdComparison::LE => op::IF_ICMPLE,
            },
            BranchInstruction::IfACmp(EqComparison::EQ, _) => op::IF_ACMPEQ,
            BranchInstruction::IfACmp(EqComparison::NE, _) => op::IF_ACMPNE,
            BranchInstruction::IfNull(EqComparison::EQ, _) => op::IFNULL,
            BranchInstruction::IfNull(EqComparison::NE, _) => op::IFNONNULL,
            BranchInstruction::Goto(_) => op::GOTO,
            BranchInstruction::GotoW(_) => op::GOTO_W,
            BranchInstruction::Jsr(_) => op::JSR,
            BranchInstruction::JsrW(_) => op::JSR_W,
            BranchInstruction::TableSwitch { .. } => op::TABLESWITCH,
            BranchInstruction::LookupSwitch { .. } => op::LOOKUPSWITCH,
        }
    }

    /// Encoded length of the instruction in bytes (including any switch padding)
    pub fn length(&self) -> usize {
        self.width()
    }

    pub fn name(&self) -> &'static str {
        op::mnemonic(self.opcode()).unwrap_or("<invalid>")
    }

    /// Stack slots consumed and produced
    pub fn stack_effect(&self) -> (usize, usize) {
        match self {
            BranchInstruction::If(_, _) | BranchInstruction::IfNull(_, _) => (1, 0),
            BranchInstruction::IfICmp(_, _) | BranchInstruction::IfACmp(_, _) => (2, 0),
            BranchInstruction::Goto(_) | BranchInstruction::GotoW(_) => (0, 0),
            BranchInstruction::Jsr(_) | BranchInstruction::JsrW(_) => (0, 1),
            BranchInstruction::TableSwitch { .. } | BranchInstruction::LookupSwitch { .. } => {
                (1, 0)
            }
        }
    }

    /// Is this one of the `if*` instructions (which fall through when the test fails)?
    pub fn is_conditional(&self) -> bool {
        matches!(
            self,
            BranchInstruction::If(_, _)
                | BranchInstruction::IfICmp(_, _)
                | BranchInstruction::IfACmp(_, _)
                | BranchInstruction::IfNull(_, _)
        )
    }

    pub fn is_switch(&self) -> bool {
        matches!(
            self,
            BranchInstruction::TableSwitch { .. } | BranchInstruction::LookupSwitch { .. }
        )
    }

    pub fn is_jsr(&self) -> bool {
        matches!(self, BranchInstruction::Jsr(_) | BranchInstruction::JsrW(_))
    }

    /// Values matched by the cases of a switch (empty for other branches)
    pub fn matches(&self) -> Vec<i32> {
        match self {
            BranchInstruction::TableSwitch { low, targets, .. } => {
                (0..targets.len() as i32).map(|i| low + i).collect()
            }
            BranchInstruction::LookupSwitch { targets, .. } => {
                targets.iter().map(|(key, _)| *key).collect()
            }
            _ => vec![],
        }
    }

    /// Recompute the padding of a switch for the given position
    ///
    /// Returns the change in the length of the instruction.
    pub fn update_padding(&mut self, position: usize) -> isize {
        match self {
            BranchInstruction::TableSwitch { padding, .. }
            | BranchInstruction::LookupSwitch { padding, .. } => {
                let old_padding = *padding as isize;
                *padding = ((4 - ((position + 1) % 4)) % 4) as u8;
                *padding as isize - old_padding
            }
            _ => 0,
        }
    }

    /// Capabilities of the instruction, in the order in which visitors see them
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            BranchInstruction::If(_, _)
            | BranchInstruction::IfICmp(_, _)
            | BranchInstruction::IfACmp(_, _)
            | BranchInstruction::IfNull(_, _) => caps::IF,
            BranchInstruction::Goto(_) => caps::GOTO,
            BranchInstruction::GotoW(_) => caps::GOTO_W,
            BranchInstruction::Jsr(_) => caps::JSR,
            BranchInstruction::JsrW(_) => caps::JSR_W,
            BranchInstruction::TableSwitch { .. } | BranchInstruction::LookupSwitch { .. } => {
                caps::SELECT
            }
        }
    }

    /// Map every target, failing if any of the mappings fail
    ///
    /// Switch case targets are mapped in order, followed by the default.
    pub fn try_map_targets<Lbl2, E>(
        &self,
        mut map_target: impl FnMut(&Lbl) -> Result<Lbl2, E>,
    ) -> Result<BranchInstruction<Lbl2>, E> {
        use BranchInstruction::*;

        Ok(match self {
            If(op, lbl) => If(*op, map_target(lbl)?),
            IfICmp(op, lbl) => IfICmp(*op, map_target(lbl)?),
            IfACmp(op, lbl) => IfACmp(*op, map_target(lbl)?),
            IfNull(op, lbl) => IfNull(*op, map_target(lbl)?),
            Goto(lbl) => Goto(map_target(lbl)?),
            GotoW(lbl) => GotoW(map_target(lbl)?),
            Jsr(lbl) => Jsr(map_target(lbl)?),
            JsrW(lbl) => JsrW(map_target(lbl)?),
            TableSwitch {
                padding,
                default,
                low,
                targets,
            } => {
                let targets = targets
                    .iter()
                    .map(&mut map_target)
                    .collect::<Result<Vec<_>, E>>()?;
                TableSwitch {
                    padding: *padding,
                    default: map_target(default)?,
                    low: *low,
                    targets,
                }
            }
            LookupSwitch {
                padding,
                default,
                targets,
            } => {
                let targets = targets
                    .iter()
                    .map(|(key, lbl)| Ok((*key, map_target(lbl)?)))
                    .collect::<Result<Vec<_>, E>>()?;
                LookupSwitch {
                    padding: *padding,
                    default: map_target(default)?,
                    targets,
                }
            }
        })
    }

    pub fn map_targets<Lbl2>(
        &self,
        mut map_target: impl FnMut(&Lbl) -> Lbl2,
    ) -> BranchInstruction<Lbl2> {
        match self.try_map_targets(|lbl| Ok::<Lbl2, Infallible>(map_target(lbl))) {
            Ok(mapped) => mapped,
            Err(never) => match never {},
        }
    }
}

impl<Lbl: Copy + PartialEq> BranchInstruction<Lbl> {
    /// Main target of the branch (the default target, for switches)
    pub fn target(&self) -> Lbl {
        match self {
            BranchInstruction::If(_, lbl)
            | BranchInstruction::IfICmp(_, lbl)
            | BranchInstruction::IfACmp(_, lbl)
            | BranchInstruction::IfNull(_, lbl)
            | BranchInstruction::Goto(lbl)
            | BranchInstruction::GotoW(lbl)
            | BranchInstruction::Jsr(lbl)
            | BranchInstruction::JsrW(lbl) => *lbl,
            BranchInstruction::TableSwitch { default, .. }
            | BranchInstruction::LookupSwitch { default, .. } => *default,
        }
    }

    /// Switch to the encoding with a 4-byte offset (for `goto` and `jsr`)
    ///
    /// Returns whether anything changed.
    pub fn widen(&mut self) -> bool {
        let widened = match self {
            BranchInstruction::Goto(target) => BranchInstruction::GotoW(*target),
            BranchInstruction::Jsr(target) => BranchInstruction::JsrW(*target),
            _ => return false,
        };
        *self = widened;
        true
    }

    /// Targets of the cases of a switch (empty for other branches)
    pub fn case_targets(&self) -> Vec<Lbl> {
        match self {
            BranchInstruction::TableSwitch { targets, .. } => targets.clone(),
            BranchInstruction::LookupSwitch { targets, .. } => {
                targets.iter().map(|(_, lbl)| *lbl).collect()
            }
            _ => vec![],
        }
    }

    /// Every target reference held by the instruction (case targets, then the main target)
    ///
    /// A target referenced more than once shows up more than once.
    pub fn targets(&self) -> Vec<Lbl> {
        let mut targets = self.case_targets();
        targets.push(self.target());
        targets
    }

    /// Does the instruction refer to the target anywhere?
    pub fn references(&self, target: Lbl) -> bool {
        self.targets().contains(&target)
    }

    /// Replace the main target (the default target, for switches), returning the old one
    pub fn set_target(&mut self, new_target: Lbl) -> Lbl {
        match self {
            BranchInstruction::If(_, lbl)
            | BranchInstruction::IfICmp(_, lbl)
            | BranchInstruction::IfACmp(_, lbl)
            | BranchInstruction::IfNull(_, lbl)
            | BranchInstruction::Goto(lbl)
            | BranchInstruction::GotoW(lbl)
            | BranchInstruction::Jsr(lbl)
            | BranchInstruction::JsrW(lbl)
            | BranchInstruction::TableSwitch { default: lbl, .. }
            | BranchInstruction::LookupSwitch { default: lbl, .. } => {
                std::mem::replace(lbl, new_target)
            }
        }
    }

    /// Replace the target of one case of a switch, returning the old target
    pub fn set_case_target(&mut self, case: usize, new_target: Lbl) -> Option<Lbl> {
        let lbl = match self {
            BranchInstruction::TableSwitch { targets, .. } => targets.get_mut(case)?,
            BranchInstruction::LookupSwitch { targets, .. } => &mut targets.get_mut(case)?.1,
            _ => return None,
        };
        Some(std::mem::replace(lbl, new_target))
    }

    /// Replace every reference to one target with another, returning how many were replaced
    pub fn replace_target(&mut self, old_target: Lbl, new_target: Lbl) -> usize {
        let mut replaced = 0;
        let mut replace = |lbl: &mut Lbl| {
            if *lbl == old_target {
                *lbl = new_target;
                replaced += 1;
            }
        };
        match self {
            BranchInstruction::If(_, lbl)
            | BranchInstruction::IfICmp(_, lbl)
            | BranchInstruction::IfACmp(_, lbl)
            | BranchInstruction::IfNull(_, lbl)
            | BranchInstruction::Goto(lbl)
            | BranchInstruction::GotoW(lbl)
            | BranchInstruction::Jsr(lbl)
            | BranchInstruction::JsrW(lbl) => replace(lbl),
            BranchInstruction::TableSwitch {
                default, targets, ..
            } => {
                targets.iter_mut().for_each(&mut replace);
                replace(default);
            }
            BranchInstruction::LookupSwitch {
                default, targets, ..
            } => {
                targets.iter_mut().for_each(|(_, lbl)| replace(lbl));
                replace(default);
            }
        }
        replaced
    }
}

impl<Lbl> Width for BranchInstruction<Lbl> {
    fn width(&self) -> usize {
        match self {
            BranchInstruction::Goto(_)
            | BranchInstruction::Jsr(_)
            | BranchInstruction::If(_, _)
            | BranchInstruction::IfICmp(_, _)
            | BranchInstruction::IfACmp(_, _)
            | BranchInstruction::IfNull(_, _) => 3,

            BranchInstruction::GotoW(_) | BranchInstruction::JsrW(_) => 5,

            BranchInstruction::TableSwitch {
                padding, targets, ..
            } => 1 + *padding as usize + 4 * (3 + targets.len()),

            BranchInstruction::LookupSwitch {
                padding, targets, ..
            } => 1 + *padding as usize + 8 * (1 + targets.len()),
        }
    }
}

/// Offsets have been resolved, but the short forms still need to fit theirs in 16 bits
impl Serialize for BranchInstruction<i32> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        fn short_offset(offset: i32) -> std::io::Result<i16> {
            i16::try_from(offset).map_err(|_| {
                let msg = format!("Branch offset {} does not fit in 16 bits", offset);
                IoError::new(ErrorKind::InvalidData, msg)
            })
        }

        self.opcode().serialize(writer)?;
        match self {
            BranchInstruction::If(_, lbl)
            | BranchInstruction::IfICmp(_, lbl)
            | BranchInstruction::IfACmp(_, lbl)
            | BranchInstruction::IfNull(_, lbl)
            | BranchInstruction::Goto(lbl)
            | BranchInstruction::Jsr(lbl) => short_offset(*lbl)?.serialize(writer)?,
            BranchInstruction::GotoW(lbl) | BranchInstruction::JsrW(lbl) => {
                lbl.serialize(writer)?
            }
            BranchInstruction::TableSwitch {
                padding,
                default,
                low,
                targets,
            } => {
                for _ in 0..*padding {
                    0x00u8.serialize(writer)?;
                }
                default.serialize(writer)?;
                low.serialize(writer)?;
                (low + targets.len() as i32 - 1).serialize(writer)?;
                for target in targets {
                    target.serialize(writer)?;
                }
            }
            BranchInstruction::LookupSwitch {
                padding,
                default,
                targets,
            } => {
                for _ in 0..*padding {
                    0x00u8.serialize(writer)?;
                }
                default.serialize(writer)?;
                (targets.len() as i32).serialize(writer)?;
                for (key, target) in targets {
                    key.serialize(writer)?;
                    target.serialize(writer)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn switch_padding() {
        let mut switch = BranchInstruction::lookup_switch(vec![(1, 10), (5, 20)], 30);
        assert_eq!(switch.length(), 1 + 8 * 3);

        // At position 0, the default offset starts at 4
        assert_eq!(switch.update_padding(0), 3);
        assert_eq!(switch.length(), 4 + 8 * 3);
        assert_eq!(switch.update_padding(3), -3);
        assert_eq!(switch.update_padding(5), 2);

        let mut bytes = vec![];
        switch.serialize(&mut bytes).unwrap();
        assert_eq!(bytes.len(), switch.length());
        assert_eq!(&bytes[..3], &[0xab, 0, 0]);
        assert_eq!(&bytes[3..7], &30i32.to_be_bytes());
        assert_eq!(&bytes[7..11], &2i32.to_be_bytes());
    }

    #[test]
    fn table_switch_encoding() {
        let switch = BranchInstruction::table_switch(4, vec![-8, 12], 16);
        let mut bytes = vec![];
        switch.serialize(&mut bytes).unwrap();
        let mut expected = vec![0xaa];
        for word in &[16i32, 4, 5, -8, 12] {
            expected.extend_from_slice(&word.to_be_bytes());
        }
        assert_eq!(bytes, expected);
        assert_eq!(switch.matches(), vec![4, 5]);
    }

    #[test]
    fn widening() {
        let mut goto = BranchInstruction::Goto(40_000);
        assert!(goto.widen());
        assert_eq!(goto, BranchInstruction::GotoW(40_000));
        assert_eq!(goto.opcode(), 0xc8);
        assert!(!goto.widen());

        let mut jsr = BranchInstruction::Jsr(8);
        assert!(jsr.widen());
        assert_eq!(jsr.opcode(), 0xc9);

        let mut bytes = vec![];
        assert!(BranchInstruction::Goto(40_000).serialize(&mut bytes).is_err());
    }

    #[test]
    fn retargeting() {
        let mut switch = BranchInstruction::lookup_switch(vec![(1, 'a'), (2, 'b'), (3, 'a')], 'a');
        assert_eq!(switch.targets(), vec!['a', 'b', 'a', 'a']);
        assert_eq!(switch.replace_target('a', 'c'), 3);
        assert_eq!(switch.set_case_target(1, 'd'), Some('b'));
        assert_eq!(switch.set_target('e'), 'c');
        assert_eq!(switch.targets(), vec!['c', 'd', 'c', 'e']);
        assert_eq!(switch.case_targets(), vec!['c', 'd', 'c']);

        let goto = BranchInstruction::Goto(3).map_targets(|offset| offset * 2);
        assert_eq!(goto.target(), 6);
    }
}
