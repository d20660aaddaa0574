//! Entry payload states.

use serde::{Deserialize, Serialize};

/// The payload of an entry: a value or one of the marker states.
///
/// `RemovedPhase1` and `RemovedPhase2` only exist while an operation is in
/// flight; reads never return them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Token<V> {
    Valid(V),
    Invalid,
    LocalInvalid,
    Destroyed,
    Tombstone,
    RemovedPhase1,
    RemovedPhase2,
}

/// Payload-free view of a [`Token`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Valid,
    Invalid,
    LocalInvalid,
    Destroyed,
    Tombstone,
    RemovedPhase1,
    RemovedPhase2,
}

impl TokenKind {
    /// True for states that make a key logically absent.
    pub fn is_removed(self) -> bool {
        matches!(
            self,
            TokenKind::Destroyed
                | TokenKind::Tombstone
                | TokenKind::RemovedPhase1
                | TokenKind::RemovedPhase2
        )
    }

    pub fn is_invalid(self) -> bool {
        matches!(self, TokenKind::Invalid | TokenKind::LocalInvalid)
    }
}

impl<V> Token<V> {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Valid(_) => TokenKind::Valid,
            Token::Invalid => TokenKind::Invalid,
            Token::LocalInvalid => TokenKind::LocalInvalid,
            Token::Destroyed => TokenKind::Destroyed,
            Token::Tombstone => TokenKind::Tombstone,
            Token::RemovedPhase1 => TokenKind::RemovedPhase1,
            Token::RemovedPhase2 => TokenKind::RemovedPhase2,
        }
    }

    pub fn value(&self) -> Option<&V> {
        match self {
            Token::Valid(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_removed(&self) -> bool {
        self.kind().is_removed()
    }

    pub fn is_invalid(&self) -> bool {
        self.kind().is_invalid()
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, Token::Tombstone)
    }

    pub fn is_removed_phase2(&self) -> bool {
        matches!(self, Token::RemovedPhase2)
    }

    /// Valid or invalidated: the key is present.
    pub fn is_live(&self) -> bool {
        !self.is_removed()
    }
}
