use tracing::info;

use crate::cascade::{CascadeController, CascadeError, CascadeRequest, Delivery, Stage};
use crate::client::OptionClient;
use crate::review::{ReviewError, ReviewTable, SaveNotice};

// One analyst's drill-down: the cascade, the client it fetches through, and
// the review table fed by whatever change set the cascade last resolved.
pub struct ReviewSession {
    client: OptionClient,
    controller: CascadeController,
    table: ReviewTable,
}

impl ReviewSession {
    pub async fn open(client: OptionClient) -> Result<Self, CascadeError> {
        let mut session = Self {
            client,
            controller: CascadeController::new(),
            table: ReviewTable::default(),
        };
        let request = session.controller.start()?;
        session.drive(request).await;
        Ok(session)
    }

    pub fn controller(&self) -> &CascadeController {
        &self.controller
    }

    pub fn table(&self) -> &ReviewTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut ReviewTable {
        &mut self.table
    }

    pub async fn select(&mut self, stage: Stage, value: &str) -> Result<Delivery, CascadeError> {
        let request = self.controller.select(stage, value)?;
        self.table.clear();
        Ok(self.drive(request).await)
    }

    // Applies `values` to the stages in order, starting at the document type.
    pub async fn select_path(&mut self, values: &[&str]) -> Result<(), CascadeError> {
        for (stage, value) in Stage::ALL.into_iter().zip(values) {
            self.select(stage, value).await?;
        }
        Ok(())
    }

    pub async fn retry(&mut self) -> Result<Delivery, CascadeError> {
        let request = self.controller.retry()?;
        self.table.clear();
        Ok(self.drive(request).await)
    }

    pub async fn commit(&mut self) -> Result<&SaveNotice, ReviewError> {
        self.table.commit(self.client.backend()).await
    }

    async fn drive(&mut self, request: CascadeRequest) -> Delivery {
        let response = self.client.fetch(request).await;
        let delivery = self.controller.deliver(response);

        if delivery == Delivery::Applied {
            if let Some(changes) = self.controller.resolution() {
                info!(rows = changes.rows.len(), "review table reloaded");
                self.table.load(changes);
            }
        }
        delivery
    }
}
