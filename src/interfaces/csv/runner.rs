use super::command_reader::{Command, CommandType};
use crate::application::service::ApprovalService;
use crate::domain::package::{ActorId, NewPackage, PackageId, PlanId, UserId};
use crate::error::Result;
use crate::infrastructure::clock::ManualClock;
use std::sync::Arc;

/// Replays command rows against an `ApprovalService`, moving the clock to
/// each row's timestamp first.
pub struct CommandRunner {
    service: ApprovalService,
    clock: Arc<ManualClock>,
}

impl CommandRunner {
    pub fn new(service: ApprovalService, clock: Arc<ManualClock>) -> Self {
        Self { service, clock }
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        self.clock.set(command.at);
        let service = &self.service;

        match command.r#type {
            CommandType::Purchase => {
                service
                    .purchase(NewPackage {
                        id: package_id(&command)?,
                        user: UserId(command.required(&command.user, "user")?),
                        plan: PlanId(command.required(&command.plan, "plan")?),
                        credits: command.required(&command.credits, "credits")?,
                        amount: command.required(&command.amount, "amount")?,
                    })
                    .await?;
            }
            CommandType::Approve => {
                service
                    .approve(
                        package_id(&command)?,
                        actor(&command)?,
                        version(&command)?,
                        command.key.as_deref(),
                    )
                    .await?;
            }
            CommandType::Reject => {
                let reason = command.required(&command.reason, "reason")?;
                service
                    .reject(
                        package_id(&command)?,
                        actor(&command)?,
                        &reason,
                        version(&command)?,
                        command.key.as_deref(),
                    )
                    .await?;
            }
            CommandType::Consume => {
                service
                    .consume_credit(package_id(&command)?, version(&command)?)
                    .await?;
            }
            CommandType::Restore => {
                service
                    .restore_credit(package_id(&command)?, version(&command)?)
                    .await?;
            }
            CommandType::Cancel => {
                service
                    .cancel(package_id(&command)?, actor(&command)?, version(&command)?)
                    .await?;
            }
            CommandType::Sweep => {
                service.sweep().await?;
            }
        }
        Ok(())
    }

    /// Consumes the runner and returns every stored package.
    pub async fn into_results(self) -> Result<Vec<crate::domain::package::UserPackage>> {
        self.service.into_results().await
    }
}

fn package_id(command: &Command) -> Result<PackageId> {
    command.required(&command.package, "package").map(PackageId)
}

fn actor(command: &Command) -> Result<ActorId> {
    command.required(&command.actor, "actor").map(ActorId)
}

fn version(command: &Command) -> Result<u64> {
    command.required(&command.version, "version")
}
