use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, warn};
use tutorcall_core::{
    errors::CoreError,
    models::{CallId, UserId, call::CallType},
};
use tutorcall_presence::{CallPresenceCoordinator, JoinMode};

use crate::{
    error::GatewayError,
    hub::{Broadcaster, call_group},
    protocol::{ClientEvent, RejectionCode, ServerEvent},
    registry::{ConnectionId, ConnectionRegistry, UserRole},
};

/// Identity of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub role: UserRole,
}

pub struct SessionEventGateway {
    coordinator: Arc<CallPresenceCoordinator>,
    broadcaster: Arc<dyn Broadcaster>,
    registry: ConnectionRegistry,
}

impl SessionEventGateway {
    pub fn new(coordinator: Arc<CallPresenceCoordinator>, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self {
            coordinator,
            broadcaster,
            registry: ConnectionRegistry::new(),
        }
    }

    pub fn coordinator(&self) -> &Arc<CallPresenceCoordinator> {
        &self.coordinator
    }

    /// Registers a new connection for the user.
    ///
    /// An older connection of the same user is detached and its presence is
    /// cleared before this returns, so the new connection starts clean.
    pub async fn connect(
        &self,
        user_id: UserId,
        role: UserRole,
    ) -> (Session, mpsc::UnboundedReceiver<ServerEvent>) {
        let session = Session {
            connection_id: ConnectionId::new(),
            user_id,
            role,
        };
        let outbound = self.broadcaster.attach(session.connection_id).await;

        if let Some(previous) = self.registry.register(user_id, session.connection_id).await {
            info!(user_id, %previous, "Connection superseded");
            self.broadcaster.detach(previous).await;
            self.leave_everything(user_id).await;
        }

        info!(user_id, connection = %session.connection_id, "Connected");
        (session, outbound)
    }

    /// Entry point for raw inbound frames. Failures are logged here and never
    /// reach the remote party beyond an explicit rejection.
    pub async fn dispatch(&self, session: &Session, raw: &str) {
        let result = match ClientEvent::parse(raw) {
            Ok(event) => self.handle(session, event).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {}
            Err(GatewayError::Malformed(reason)) => {
                warn!(user_id = session.user_id, "Dropping malformed payload: {}", reason);
            }
            Err(GatewayError::Core(err)) if err.is_transient() => {
                error!(user_id = session.user_id, "Store failure: {}", err);
            }
            Err(err) => {
                info!(user_id = session.user_id, "Request refused: {}", err);
            }
        }
    }

    pub async fn handle(&self, session: &Session, event: ClientEvent) -> Result<(), GatewayError> {
        if !self
            .registry
            .is_current(session.user_id, session.connection_id)
            .await
        {
            return Err(GatewayError::Superseded(session.connection_id));
        }

        match event {
            ClientEvent::JoinCall { call_id, call_type } => {
                self.join_call(session, call_id, call_type).await
            }
            ClientEvent::LeaveCall { call_id } => self.leave_call(session, call_id).await,
        }
    }

    async fn join_call(
        &self,
        session: &Session,
        call_id: CallId,
        call_type: CallType,
    ) -> Result<(), GatewayError> {
        let mode = match (call_type, session.role) {
            (CallType::Interview, UserRole::Interviewer) => JoinMode::DynamicAdd,
            _ => JoinMode::Member,
        };

        let outcome = match self.coordinator.join(call_id, session.user_id, mode).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let rejection = ServerEvent::CallRejected {
                    call_id,
                    code: rejection_code(&err),
                };
                self.broadcaster
                    .send_to(session.connection_id, rejection)
                    .await;
                return Err(err.into());
            }
        };

        if let Some(previous) = outcome.previous_call {
            self.announce_leave(previous, session.user_id, session.connection_id)
                .await;
        }

        let group = call_group(call_id);
        self.broadcaster
            .join_group(&group, session.connection_id)
            .await;
        self.broadcaster
            .broadcast(
                &group,
                ServerEvent::MemberJoinedCall {
                    user_id: session.user_id,
                },
            )
            .await;
        Ok(())
    }

    async fn leave_call(&self, session: &Session, call_id: CallId) -> Result<(), GatewayError> {
        let left = self.coordinator.leave(call_id, session.user_id).await?;
        if left {
            self.announce_leave(call_id, session.user_id, session.connection_id)
                .await;
        } else {
            debug!(call_id, user_id = session.user_id, "Leave for a call the user is not in");
            self.broadcaster
                .leave_group(&call_group(call_id), session.connection_id)
                .await;
        }
        Ok(())
    }

    /// Handles a closed connection. The cleanup runs on its own task so it
    /// completes even though the socket is gone.
    pub fn disconnect(self: &Arc<Self>, session: Session) -> JoinHandle<()> {
        let gateway = self.clone();
        tokio::spawn(async move {
            gateway.broadcaster.detach(session.connection_id).await;
            if !gateway
                .registry
                .unregister(session.user_id, session.connection_id)
                .await
            {
                debug!(user_id = session.user_id, "Superseded connection closed");
                return;
            }
            gateway.leave_everything(session.user_id).await;
            info!(user_id = session.user_id, "Disconnected");
        })
    }

    async fn leave_everything(&self, user_id: UserId) {
        match self.coordinator.leave_all(user_id).await {
            Ok(Some(call_id)) => {
                self.broadcaster
                    .broadcast(&call_group(call_id), ServerEvent::MemberLeftCall { user_id })
                    .await;
            }
            Ok(None) => {}
            Err(err) => error!(user_id, "Failed to clear presence: {}", err),
        }
    }

    async fn announce_leave(&self, call_id: CallId, user_id: UserId, connection: ConnectionId) {
        let group = call_group(call_id);
        self.broadcaster.leave_group(&group, connection).await;
        self.broadcaster
            .broadcast(&group, ServerEvent::MemberLeftCall { user_id })
            .await;
    }
}

fn rejection_code(err: &CoreError) -> RejectionCode {
    match err {
        CoreError::NotFound(_) => RejectionCode::NotFound,
        CoreError::Forbidden(_) | CoreError::Validation(_) | CoreError::Conflict(_) => {
            RejectionCode::Forbidden
        }
        _ => RejectionCode::Unavailable,
    }
}
