use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::{AddressError, InvalidAddressReason};

/// Index value addressing every child at a level.
pub const ALL_INDEX: i32 = -1;

const DELIMITER: char = '_';
const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressLevel {
    Coordinator,
    Agent,
    Worker,
    Test,
}

impl AddressLevel {
    #[must_use]
    pub const fn depth(self) -> u8 {
        match self {
            Self::Coordinator => 0,
            Self::Agent => 1,
            Self::Worker => 2,
            Self::Test => 3,
        }
    }

    #[must_use]
    pub const fn from_depth(depth: u8) -> Option<Self> {
        match depth {
            0 => Some(Self::Coordinator),
            1 => Some(Self::Agent),
            2 => Some(Self::Worker),
            3 => Some(Self::Test),
            _ => None,
        }
    }

    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Coordinator => None,
            Self::Agent => Some(Self::Coordinator),
            Self::Worker => Some(Self::Agent),
            Self::Test => Some(Self::Worker),
        }
    }

    #[must_use]
    pub const fn child(self) -> Option<Self> {
        match self {
            Self::Coordinator => Some(Self::Agent),
            Self::Agent => Some(Self::Worker),
            Self::Worker => Some(Self::Test),
            Self::Test => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Coordinator => "coordinator",
            Self::Agent => "agent",
            Self::Worker => "worker",
            Self::Test => "test",
        }
    }

    const fn segment_prefix(self) -> char {
        match self {
            Self::Coordinator => 'C',
            Self::Agent => 'A',
            Self::Worker => 'W',
            Self::Test => 'T',
        }
    }
}

/// Location of a participant in the coordinator/agent/worker/test tree.
///
/// Indices below the address level are always stored as `0`, so derived
/// equality and hashing only ever compare the meaningful components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimulatorAddress {
    level: AddressLevel,
    agent_index: i32,
    worker_index: i32,
    test_index: i32,
}

impl SimulatorAddress {
    pub const COORDINATOR: Self = Self {
        level: AddressLevel::Coordinator,
        agent_index: 0,
        worker_index: 0,
        test_index: 0,
    };

    /// Every worker of every agent.
    pub const ALL_WORKERS: Self = Self {
        level: AddressLevel::Worker,
        agent_index: ALL_INDEX,
        worker_index: ALL_INDEX,
        test_index: 0,
    };

    /// Every agent.
    pub const ALL_AGENTS: Self = Self {
        level: AddressLevel::Agent,
        agent_index: ALL_INDEX,
        worker_index: 0,
        test_index: 0,
    };

    /// Indices are `>= 0` or [`ALL_INDEX`]; every such address formats to
    /// text that parses back to itself.
    #[must_use]
    pub const fn new(
        level: AddressLevel,
        agent_index: i32,
        worker_index: i32,
        test_index: i32,
    ) -> Self {
        let depth = level.depth();
        Self {
            level,
            agent_index: if depth >= 1 { agent_index } else { 0 },
            worker_index: if depth >= 2 { worker_index } else { 0 },
            test_index: if depth >= 3 { test_index } else { 0 },
        }
    }

    #[must_use]
    pub const fn agent(agent_index: i32) -> Self {
        Self::new(AddressLevel::Agent, agent_index, 0, 0)
    }

    #[must_use]
    pub const fn worker(agent_index: i32, worker_index: i32) -> Self {
        Self::new(AddressLevel::Worker, agent_index, worker_index, 0)
    }

    #[must_use]
    pub const fn test(agent_index: i32, worker_index: i32, test_index: i32) -> Self {
        Self::new(AddressLevel::Test, agent_index, worker_index, test_index)
    }

    #[must_use]
    pub const fn level(&self) -> AddressLevel {
        self.level
    }

    #[must_use]
    pub const fn agent_index(&self) -> i32 {
        self.agent_index
    }

    #[must_use]
    pub const fn worker_index(&self) -> i32 {
        self.worker_index
    }

    #[must_use]
    pub const fn test_index(&self) -> i32 {
        self.test_index
    }

    #[must_use]
    pub const fn parent(&self) -> Option<Self> {
        match self.level.parent() {
            Some(level) => Some(Self::new(
                level,
                self.agent_index,
                self.worker_index,
                self.test_index,
            )),
            None => None,
        }
    }

    /// Derives the address of a child at the next level down.
    ///
    /// # Errors
    ///
    /// Returns an error for test addresses (no child level) and for indices
    /// that are neither `>= 1` nor [`ALL_INDEX`].
    pub fn child(&self, index: i32) -> Result<Self, AddressError> {
        let Some(level) = self.level.child() else {
            return Err(AddressError::NoChildLevel {
                address: self.to_string(),
            });
        };
        if index < 1 && index != ALL_INDEX {
            return Err(AddressError::InvalidChildIndex { index });
        }
        let child = match level {
            AddressLevel::Agent => Self::agent(index),
            AddressLevel::Worker => Self::worker(self.agent_index, index),
            AddressLevel::Test | AddressLevel::Coordinator => {
                Self::test(self.agent_index, self.worker_index, index)
            }
        };
        Ok(child)
    }

    /// Prefix test: `self` sits strictly above `other` and every component of
    /// `self` equals the matching component of `other`.
    #[must_use]
    pub fn is_parent_of(&self, other: &Self) -> bool {
        other.level > self.level && self.components().eq(other.components().take(self.depth()))
    }

    /// Routing test: a message addressed to `self` (which may hold wildcard
    /// indices) reaches `other` or one of its ancestors on the way down.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        if other.level < self.level {
            return false;
        }
        self.components()
            .zip(other.components())
            .all(|(own, theirs)| own == ALL_INDEX || own == theirs)
    }

    #[must_use]
    pub fn contains_wildcard(&self) -> bool {
        self.components().any(|index| index == ALL_INDEX)
    }

    fn depth(&self) -> usize {
        usize::from(self.level.depth())
    }

    fn components(&self) -> impl Iterator<Item = i32> {
        [self.agent_index, self.worker_index, self.test_index]
            .into_iter()
            .take(usize::from(self.level.depth()))
    }
}

impl fmt::Display for SimulatorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("C")?;
        let levels = [AddressLevel::Agent, AddressLevel::Worker, AddressLevel::Test];
        for (level, index) in levels.into_iter().zip(self.components()) {
            write!(f, "{}{}", DELIMITER, level.segment_prefix())?;
            if index == ALL_INDEX {
                f.write_str(WILDCARD)?;
            } else {
                write!(f, "{}", index)?;
            }
        }
        Ok(())
    }
}

impl FromStr for SimulatorAddress {
    type Err = AddressError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().is_empty() {
            return Err(AddressError::invalid(value, InvalidAddressReason::Empty));
        }
        let segments: Vec<&str> = value.split(DELIMITER).collect();
        let Some(depth) = segments
            .len()
            .checked_sub(1)
            .and_then(|depth| u8::try_from(depth).ok())
        else {
            return Err(AddressError::invalid(
                value,
                InvalidAddressReason::SegmentCount,
            ));
        };
        let Some(level) = AddressLevel::from_depth(depth) else {
            return Err(AddressError::invalid(
                value,
                InvalidAddressReason::SegmentCount,
            ));
        };

        let mut indices = [0i32; 3];
        let mut segment_iter = segments.into_iter();
        if segment_iter.next() != Some("C") {
            return Err(AddressError::invalid(
                value,
                InvalidAddressReason::SegmentPrefix,
            ));
        }
        let levels = [AddressLevel::Agent, AddressLevel::Worker, AddressLevel::Test];
        for ((segment, segment_level), slot) in
            segment_iter.zip(levels).zip(indices.iter_mut())
        {
            let Some(raw) = segment.strip_prefix(segment_level.segment_prefix()) else {
                return Err(AddressError::invalid(
                    value,
                    InvalidAddressReason::SegmentPrefix,
                ));
            };
            *slot = parse_index(value, raw)?;
        }

        let [agent_index, worker_index, test_index] = indices;
        Ok(Self::new(level, agent_index, worker_index, test_index))
    }
}

fn parse_index(value: &str, raw: &str) -> Result<i32, AddressError> {
    if raw == WILDCARD {
        return Ok(ALL_INDEX);
    }
    if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(AddressError::invalid(
            value,
            InvalidAddressReason::NonNumericIndex,
        ));
    }
    match raw.parse::<i32>() {
        Ok(index) if index >= 0 => Ok(index),
        _ => Err(AddressError::invalid(
            value,
            InvalidAddressReason::IndexOutOfRange,
        )),
    }
}

impl Serialize for SimulatorAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SimulatorAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
