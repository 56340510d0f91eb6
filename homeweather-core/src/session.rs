//! Ties the persisted home location to the acquisition state machine.

use crate::{
    acquisition::{AcquisitionState, AcquisitionStateMachine},
    error::StoreError,
    model::HomeLocation,
    store::HomeLocationStore,
};

#[derive(Debug)]
pub struct WeatherSession {
    homes: HomeLocationStore,
    machine: AcquisitionStateMachine,
}

impl WeatherSession {
    pub fn new(homes: HomeLocationStore, machine: AcquisitionStateMachine) -> Self {
        Self { homes, machine }
    }

    pub fn machine(&self) -> &AcquisitionStateMachine {
        &self.machine
    }

    pub async fn home(&self) -> Result<Option<HomeLocation>, StoreError> {
        self.homes.load().await
    }

    /// Persist a new home location; a changed home always starts a fresh load.
    pub async fn set_home(&self, home: &HomeLocation) -> Result<AcquisitionState, StoreError> {
        self.homes.save(home).await?;
        self.machine.load(home).await;
        Ok(self.machine.current())
    }

    pub async fn clear_home(&self) -> Result<(), StoreError> {
        self.homes.clear().await
    }

    /// Load weather for the stored home. `None` when no home is set.
    pub async fn show(&self) -> Result<Option<AcquisitionState>, StoreError> {
        let Some(home) = self.homes.load().await? else {
            return Ok(None);
        };
        self.machine.load(&home).await;
        Ok(Some(self.machine.current()))
    }

    /// Refresh weather for the stored home. `None` when no home is set.
    pub async fn refresh(&self) -> Result<Option<AcquisitionState>, StoreError> {
        let Some(home) = self.homes.load().await? else {
            return Ok(None);
        };
        self.machine.refresh(&home).await;
        Ok(Some(self.machine.current()))
    }
}
