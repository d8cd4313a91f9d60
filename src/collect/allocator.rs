//! Fund allocation
//!
//! Splits a collectible amount across an ordered list of destination wallets,
//! each bounded by a balance ceiling.
//!
//! Walk order is the caller's. Each wallet either absorbs everything left
//! (and allocation stops), takes exactly its free room, or is skipped when
//! that room is below its minimum transfer. Whatever no wallet can take stays
//! at the source and is reported as `remaining`.

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;

/// A destination wallet as seen by the allocator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationTarget {
    pub address: String,

    /// Balance ceiling in smallest units
    pub max_balance: u128,

    /// Smallest partial transfer worth making
    pub min_transfer: u128,
}

/// One planned transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocated {
    /// Position of the target in the input sequence
    pub index: usize,
    pub address: String,
    pub amount: u128,
}

/// Allocation plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    pub transfers: Vec<Allocated>,

    /// Amount no wallet could take
    pub remaining: u128,
}

impl Allocation {
    pub fn total_allocated(&self) -> u128 {
        self.transfers.iter().map(|t| t.amount).sum()
    }

    /// True when everything was allocated
    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}

/// What to do with one wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Wallet takes everything left; allocation ends
    Absorb(u128),

    /// Wallet fills up to its ceiling; allocation continues
    Fill(u128),

    /// Free room below the minimum (or none at all)
    Skip { room: u128 },
}

/// Decide how much of `remaining` a wallet holding `balance` can take
pub fn decide(remaining: u128, balance: u128, target: &AllocationTarget) -> Decision {
    let fits = balance
        .checked_add(remaining)
        .is_some_and(|total| total <= target.max_balance);
    if fits {
        return Decision::Absorb(remaining);
    }

    let room = target.max_balance.saturating_sub(balance);
    if room == 0 || room < target.min_transfer {
        Decision::Skip { room }
    } else {
        Decision::Fill(room)
    }
}

/// Source of current wallet balances
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn balance_of(&self, address: &str) -> Result<u128>;
}

/// Receives allocated amounts as they are decided
///
/// A failing sink stops the allocation; nothing after it is read or sent.
#[async_trait]
pub trait AllocationSink: Send {
    async fn accept(&mut self, index: usize, target: &AllocationTarget, amount: u128) -> Result<()>;
}

#[async_trait]
impl AllocationSink for Vec<Allocated> {
    async fn accept(&mut self, index: usize, target: &AllocationTarget, amount: u128) -> Result<()> {
        self.push(Allocated {
            index,
            address: target.address.clone(),
            amount,
        });
        Ok(())
    }
}

/// Fund allocator
pub struct FundAllocator;

impl FundAllocator {
    /// Plan an allocation without submitting anything
    pub async fn allocate<B>(
        amount: u128,
        targets: &[AllocationTarget],
        balances: &B,
    ) -> Result<Allocation>
    where
        B: BalanceSource + ?Sized,
    {
        let mut transfers: Vec<Allocated> = Vec::new();
        let remaining = Self::run(amount, targets, balances, &mut transfers).await?;

        Ok(Allocation {
            transfers,
            remaining,
        })
    }

    /// Allocate `amount`, handing each transfer to `sink` before the next
    /// balance is read
    ///
    /// # Returns
    /// The amount left unallocated
    pub async fn run<B, S>(
        amount: u128,
        targets: &[AllocationTarget],
        balances: &B,
        sink: &mut S,
    ) -> Result<u128>
    where
        B: BalanceSource + ?Sized,
        S: AllocationSink + ?Sized,
    {
        let mut remaining = amount;

        for (index, target) in targets.iter().enumerate() {
            if remaining == 0 {
                break;
            }

            let balance = balances.balance_of(&target.address).await?;
            match decide(remaining, balance, target) {
                Decision::Absorb(amount) => {
                    debug!(
                        wallet = %target.address,
                        balance = %balance,
                        amount = %amount,
                        "Wallet absorbs remaining amount"
                    );
                    sink.accept(index, target, amount).await?;
                    remaining = 0;
                }
                Decision::Fill(room) => {
                    debug!(
                        wallet = %target.address,
                        balance = %balance,
                        amount = %room,
                        "Filling wallet to its ceiling"
                    );
                    sink.accept(index, target, room).await?;
                    remaining -= room;
                }
                Decision::Skip { room } => {
                    debug!(
                        wallet = %target.address,
                        room = %room,
                        min = %target.min_transfer,
                        "Skipping wallet, room below minimum"
                    );
                }
            }
        }

        Ok(remaining)
    }
}
