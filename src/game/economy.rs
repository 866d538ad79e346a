//! Economy module
//!
//! Shop and bank transactions between a player and an NPC. Every
//! operation either applies fully or leaves the player untouched.

use tracing::debug;
use uuid::Uuid;

use crate::error::GameError;
use crate::game::action::{BankAction, TradeOrder};
use crate::game::item::ItemKind;
use crate::game::npc::Npc;
use crate::game::player::Player;

/// Run a shop order against `npc`
pub fn trade(player: &mut Player, npc: &Npc, order: TradeOrder) -> Result<String, GameError> {
    match order {
        TradeOrder::Buy { kind, quantity } => buy(player, npc, kind, quantity),
        TradeOrder::Sell { item_id, quantity } => sell(player, npc, &item_id, quantity),
    }
}

/// Buy `quantity` units of `kind` from a shop NPC
pub fn buy(player: &mut Player, npc: &Npc, kind: ItemKind, quantity: u32) -> Result<String, GameError> {
    let stock = npc.shop_stock().ok_or(GameError::NotAShop)?;
    if !stock.contains(&kind) {
        return Err(GameError::NotSoldHere);
    }

    let quantity = quantity.max(1);
    let def = kind.definition();
    let cost = def.buy_price() * u64::from(quantity);
    if player.gold < cost {
        return Err(GameError::InsufficientGold(cost));
    }
    if !player.inventory.has_room_for(kind, quantity) {
        return Err(GameError::InventoryFull);
    }

    player.inventory.add(kind, quantity)?;
    player.gold -= cost;
    debug!(player = %player.name, item = %kind, quantity, cost, "Shop purchase");
    Ok(format!("Bought {}x {} for {}g.", quantity, def.name, cost))
}

/// Sell units of an inventory entry to a shop NPC
pub fn sell(player: &mut Player, npc: &Npc, item_id: &Uuid, quantity: u32) -> Result<String, GameError> {
    if npc.shop_stock().is_none() {
        return Err(GameError::NotAShop);
    }

    let sold = player.inventory.remove(item_id, quantity)?;
    let def = sold.kind.definition();
    let earned = def.sell_price() * u64::from(sold.quantity);
    player.credit_gold(earned);
    debug!(player = %player.name, item = %sold.kind, quantity = sold.quantity, earned, "Shop sale");
    Ok(format!("Sold {}x {} for {}g.", sold.quantity, def.name, earned))
}

/// Move items between inventory and bank through a banker NPC.
///
/// A missing quantity means the whole stack.
pub fn bank(
    player: &mut Player,
    npc: &Npc,
    action: BankAction,
    item_id: &Uuid,
    quantity: Option<u32>,
) -> Result<String, GameError> {
    if !npc.is_banker() {
        return Err(GameError::NotABank);
    }

    match action {
        BankAction::Deposit => {
            let held = player.inventory.get(item_id).ok_or(GameError::ItemNotFound)?;
            let quantity = quantity.unwrap_or(held.quantity);
            let item = player.inventory.remove(item_id, quantity)?;
            let name = item.name();
            player.bank.deposit(item);
            Ok(format!("Deposited {}.", name))
        }
        BankAction::Withdraw => {
            let item = player.bank.withdraw(item_id, quantity.unwrap_or(0))?;
            let name = item.name();
            if let Err(e) = player.inventory.insert(item.clone()) {
                player.bank.restore(item);
                return Err(e);
            }
            Ok(format!("Withdrew {}.", name))
        }
    }
}
