//! Farm factory: one farm per pool, and a single implementation pointer
//! shared by all of them.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytemuck::Zeroable;
use solana_program::{msg, pubkey::Pubkey};

use crate::access::{AccessManager, Role};
use crate::capability::Venue;
use crate::error::FarmError;
use crate::event::{Event, EventLog};
use crate::farm::FarmLogic;
use crate::state::{derive_farm_address, FarmState};

/// Deployed farm behaviours, keyed by implementation id. Registering an
/// implementation does not activate it.
#[derive(Debug, Clone, Default)]
pub struct ImplementationRegistry {
    entries: BTreeMap<Pubkey, Arc<dyn FarmLogic>>,
}

impl ImplementationRegistry {
    pub fn register(&mut self, id: Pubkey, logic: Arc<dyn FarmLogic>) -> Result<(), FarmError> {
        if self.entries.contains_key(&id) {
            return Err(FarmError::InvalidConfig);
        }
        self.entries.insert(id, logic);
        Ok(())
    }

    pub fn get(&self, id: &Pubkey) -> Option<Arc<dyn FarmLogic>> {
        self.entries.get(id).cloned()
    }

    pub fn contains(&self, id: &Pubkey) -> bool {
        self.entries.contains_key(id)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FarmAccount {
    pub address: Pubkey,
    pub bump: u8,
    pub state: FarmState,
}

#[derive(Debug, Clone)]
pub struct FarmFactory {
    address: Pubkey,
    asset_router: Pubkey,
    governor: Pubkey,
    implementation: Pubkey,
    registry: ImplementationRegistry,
    farms: BTreeMap<Pubkey, FarmAccount>,
}

impl FarmFactory {
    pub fn new(
        address: Pubkey,
        asset_router: Pubkey,
        governor: Pubkey,
        implementation: Pubkey,
        logic: Arc<dyn FarmLogic>,
    ) -> Self {
        let mut registry = ImplementationRegistry::default();
        registry.entries.insert(implementation, logic);
        Self {
            address,
            asset_router,
            governor,
            implementation,
            registry,
            farms: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> Pubkey {
        self.address
    }

    pub fn implementation(&self) -> Pubkey {
        self.implementation
    }

    /// Behaviour every farm currently runs.
    pub fn logic(&self) -> Result<Arc<dyn FarmLogic>, FarmError> {
        self.registry
            .get(&self.implementation)
            .ok_or(FarmError::UnknownImplementation)
    }

    pub fn register_implementation(
        &mut self,
        id: Pubkey,
        logic: Arc<dyn FarmLogic>,
    ) -> Result<(), FarmError> {
        self.registry.register(id, logic)?;
        msg!("Farm implementation {} registered", id);
        Ok(())
    }

    pub fn farm(&self, pool: &Pubkey) -> Option<&FarmAccount> {
        self.farms.get(pool)
    }

    pub fn farm_mut(&mut self, pool: &Pubkey) -> Option<&mut FarmAccount> {
        self.farms.get_mut(pool)
    }

    pub fn farm_count(&self) -> usize {
        self.farms.len()
    }

    pub fn pools(&self) -> impl Iterator<Item = &Pubkey> {
        self.farms.keys()
    }

    /// Deploy and initialize the farm for `pool`. Requires FARM_OWNER or ADMIN.
    pub fn create_farm(
        &mut self,
        access: &AccessManager,
        caller: &Pubkey,
        pool: &Pubkey,
        venue: Option<&Venue>,
        events: &mut EventLog,
    ) -> Result<Pubkey, FarmError> {
        access.require_any_role(&[Role::FarmOwner, Role::Admin], caller)?;
        if self.farms.contains_key(pool) {
            return Err(FarmError::FarmAlreadyExists);
        }
        let venue = venue.ok_or(FarmError::PoolNotRegistered)?;

        let (address, bump) = derive_farm_address(&self.address, pool);
        let mut state = FarmState::zeroed();
        self.logic()?
            .initialize(&mut state, &address, venue, &self.asset_router, events)?;
        self.farms.insert(*pool, FarmAccount { address, bump, state });

        events.emit(Event::FarmCreated { pool: *pool, farm: address });
        msg!("Farm {} created for pool {}", address, pool);
        Ok(address)
    }

    /// Repoint every farm at `implementation`. Governor only. Farm storage is
    /// not touched.
    pub fn upgrade_farms(
        &mut self,
        caller: &Pubkey,
        implementation: &Pubkey,
        events: &mut EventLog,
    ) -> Result<u64, FarmError> {
        if *caller != self.governor {
            return Err(FarmError::Unauthorized);
        }
        if !self.registry.contains(implementation) {
            return Err(FarmError::UnknownImplementation);
        }
        self.implementation = *implementation;
        let farms = self.farms.len() as u64;

        events.emit(Event::FarmsUpgraded { implementation: *implementation, farms });
        msg!("{} farms upgraded to {}", farms, implementation);
        Ok(farms)
    }
}
