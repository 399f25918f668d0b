use std::fmt::{Display, Formatter};

/// The operators understood at the top of an update document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateOperator {
    Push,
    Pull,
    PullAll,
    AddToSet,
    SplicePush,
    Move,
    Inc,
    Mul,
    Rename,
    Unset,
    Pop,
}

impl UpdateOperator {
    pub fn from_key(key: &str) -> Option<UpdateOperator> {
        match key {
            "$push" => Some(UpdateOperator::Push),
            "$pull" => Some(UpdateOperator::Pull),
            "$pullAll" => Some(UpdateOperator::PullAll),
            "$addToSet" => Some(UpdateOperator::AddToSet),
            "$splicePush" => Some(UpdateOperator::SplicePush),
            "$move" => Some(UpdateOperator::Move),
            "$inc" => Some(UpdateOperator::Inc),
            "$mul" => Some(UpdateOperator::Mul),
            "$rename" => Some(UpdateOperator::Rename),
            "$unset" => Some(UpdateOperator::Unset),
            "$pop" => Some(UpdateOperator::Pop),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            UpdateOperator::Push => "$push",
            UpdateOperator::Pull => "$pull",
            UpdateOperator::PullAll => "$pullAll",
            UpdateOperator::AddToSet => "$addToSet",
            UpdateOperator::SplicePush => "$splicePush",
            UpdateOperator::Move => "$move",
            UpdateOperator::Inc => "$inc",
            UpdateOperator::Mul => "$mul",
            UpdateOperator::Rename => "$rename",
            UpdateOperator::Unset => "$unset",
            UpdateOperator::Pop => "$pop",
        }
    }

    /// Operators whose operand is never a document, so a document operand
    /// addresses fields one level deeper: `{$inc: {stats: {views: 1}}}`.
    pub(crate) fn descends_into_documents(&self) -> bool {
        matches!(
            self,
            UpdateOperator::Inc
                | UpdateOperator::Mul
                | UpdateOperator::Rename
                | UpdateOperator::Unset
                | UpdateOperator::Pop
        )
    }

    /// Operators that create a missing target field before writing to it.
    pub(crate) fn creates_missing_field(&self) -> bool {
        matches!(
            self,
            UpdateOperator::Push
                | UpdateOperator::AddToSet
                | UpdateOperator::SplicePush
                | UpdateOperator::Inc
                | UpdateOperator::Mul
        )
    }
}

impl Display for UpdateOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}
