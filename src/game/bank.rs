//! Bank module
//!
//! Unbounded per-player storage. Stackable kinds merge into one entry.

use serde::Serialize;
use uuid::Uuid;

use crate::error::GameError;
use crate::game::inventory::InventoryItem;

/// Player bank storage
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Bank {
    items: Vec<InventoryItem>,
}

impl Bank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[InventoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &Uuid) -> Option<&InventoryItem> {
        self.items.iter().find(|item| item.id == *id)
    }

    /// Store an item, merging into an existing stack
    pub fn deposit(&mut self, item: InventoryItem) {
        if item.kind.is_stackable() {
            if let Some(stack) = self.items.iter_mut().find(|i| i.kind == item.kind) {
                stack.quantity = stack.quantity.saturating_add(item.quantity);
                return;
            }
        }
        self.items.push(item);
    }

    /// Take `quantity` units out of an entry
    pub fn withdraw(&mut self, id: &Uuid, quantity: u32) -> Result<InventoryItem, GameError> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == *id)
            .ok_or(GameError::ItemNotFound)?;

        let entry = &mut self.items[index];
        if quantity > entry.quantity {
            return Err(GameError::InsufficientItems);
        }
        if quantity > 0 && quantity < entry.quantity {
            entry.quantity -= quantity;
            return Ok(InventoryItem::new(entry.kind, quantity));
        }
        Ok(self.items.remove(index))
    }

    /// Put a withdrawn item back unchanged
    pub fn restore(&mut self, item: InventoryItem) {
        self.deposit(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::item::ItemKind;

    #[test]
    fn test_deposit_merges_stacks() {
        let mut bank = Bank::new();
        bank.deposit(InventoryItem::new(ItemKind::GoldOre, 4));
        bank.deposit(InventoryItem::new(ItemKind::GoldOre, 6));
        bank.deposit(InventoryItem::new(ItemKind::IronSword, 1));
        bank.deposit(InventoryItem::new(ItemKind::IronSword, 1));

        assert_eq!(bank.len(), 3);
        assert_eq!(bank.items()[0].quantity, 10);
    }

    #[test]
    fn test_withdraw() {
        let mut bank = Bank::new();
        bank.deposit(InventoryItem::new(ItemKind::Coal, 10));
        let id = bank.items()[0].id;

        let part = bank.withdraw(&id, 3).unwrap();
        assert_eq!(part.quantity, 3);
        assert_eq!(bank.items()[0].quantity, 7);

        assert_eq!(bank.withdraw(&id, 8), Err(GameError::InsufficientItems));

        // Zero means the whole stack
        let rest = bank.withdraw(&id, 0).unwrap();
        assert_eq!(rest.quantity, 7);
        assert!(bank.is_empty());

        assert_eq!(bank.withdraw(&id, 1), Err(GameError::ItemNotFound));
    }
}
