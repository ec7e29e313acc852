//! Location adapters.
//!
//! `GeoClueLocator` asks the GeoClue2 service on the system bus for a
//! single fix. `FixedLocator` is for stationary kiosks whose position is
//! configured.

use async_trait::async_trait;
use attend_core::{Coordinates, LocateError, Locator};
use futures::StreamExt;
use std::time::Duration;
use zbus::zvariant::{ObjectPath, OwnedObjectPath};
use zbus::Connection;

/// GClueAccuracyLevel: EXACT.
pub const ACCURACY_EXACT: u32 = 8;

#[zbus::proxy(
    interface = "org.freedesktop.GeoClue2.Manager",
    default_service = "org.freedesktop.GeoClue2",
    default_path = "/org/freedesktop/GeoClue2/Manager"
)]
trait Manager {
    async fn get_client(&self) -> zbus::Result<OwnedObjectPath>;
    async fn delete_client(&self, client: &ObjectPath<'_>) -> zbus::Result<()>;
}

#[zbus::proxy(
    interface = "org.freedesktop.GeoClue2.Client",
    default_service = "org.freedesktop.GeoClue2"
)]
trait Client {
    async fn start(&self) -> zbus::Result<()>;
    async fn stop(&self) -> zbus::Result<()>;

    #[zbus(property)]
    fn location(&self) -> zbus::Result<OwnedObjectPath>;
    #[zbus(property)]
    fn set_desktop_id(&self, id: &str) -> zbus::Result<()>;
    #[zbus(property)]
    fn set_requested_accuracy_level(&self, level: u32) -> zbus::Result<()>;

    #[zbus(signal)]
    fn location_updated(
        &self,
        previous: ObjectPath<'_>,
        current: ObjectPath<'_>,
    ) -> zbus::Result<()>;
}

#[zbus::proxy(
    interface = "org.freedesktop.GeoClue2.Location",
    default_service = "org.freedesktop.GeoClue2"
)]
trait Location {
    #[zbus(property)]
    fn latitude(&self) -> zbus::Result<f64>;
    #[zbus(property)]
    fn longitude(&self) -> zbus::Result<f64>;
    #[zbus(property)]
    fn accuracy(&self) -> zbus::Result<f64>;
}

/// One-shot GeoClue2 client per `locate` call.
pub struct GeoClueLocator {
    desktop_id: String,
    accuracy_level: u32,
}

impl GeoClueLocator {
    pub fn new(desktop_id: impl Into<String>) -> Self {
        Self {
            desktop_id: desktop_id.into(),
            accuracy_level: ACCURACY_EXACT,
        }
    }

    pub fn with_accuracy_level(mut self, level: u32) -> Self {
        self.accuracy_level = level;
        self
    }

    async fn request_fix(&self) -> Result<Coordinates, LocateError> {
        let conn = Connection::system()
            .await
            .map_err(|e| LocateError::Unsupported(format!("system bus: {e}")))?;

        let manager = ManagerProxy::new(&conn).await.map_err(classify)?;
        let client_path = manager.get_client().await.map_err(classify)?;
        tracing::debug!(client = %client_path.as_str(), "geoclue client created");

        let client = ClientProxy::builder(&conn)
            .path(client_path.clone())
            .map_err(classify)?
            .build()
            .await
            .map_err(classify)?;

        let fix = self.start_and_wait(&conn, &client).await;

        if let Err(err) = client.stop().await {
            tracing::debug!(error = %err, "geoclue client stop failed");
        }
        if let Err(err) = manager.delete_client(&client_path).await {
            tracing::debug!(error = %err, "geoclue client delete failed");
        }
        fix
    }

    async fn start_and_wait(
        &self,
        conn: &Connection,
        client: &ClientProxy<'_>,
    ) -> Result<Coordinates, LocateError> {
        client
            .set_desktop_id(&self.desktop_id)
            .await
            .map_err(classify)?;
        client
            .set_requested_accuracy_level(self.accuracy_level)
            .await
            .map_err(classify)?;

        // Subscribe before starting so the first update cannot be missed.
        let mut updates = client.receive_location_updated().await.map_err(classify)?;
        client.start().await.map_err(classify)?;

        if updates.next().await.is_none() {
            return Err(LocateError::Unsupported("location update stream closed".into()));
        }

        let location_path = client.location().await.map_err(classify)?;
        let location = LocationProxy::builder(conn)
            .path(location_path)
            .map_err(classify)?
            .build()
            .await
            .map_err(classify)?;

        let latitude = location.latitude().await.map_err(classify)?;
        let longitude = location.longitude().await.map_err(classify)?;
        if let Ok(accuracy) = location.accuracy().await {
            tracing::debug!(latitude, longitude, accuracy, "geoclue fix");
        }
        Ok(Coordinates::new(latitude, longitude))
    }
}

#[async_trait]
impl Locator for GeoClueLocator {
    async fn locate(&self, timeout: Duration) -> Result<Coordinates, LocateError> {
        // On timeout the future is dropped with its bus connection, which
        // makes GeoClue release the client.
        match tokio::time::timeout(timeout, self.request_fix()).await {
            Ok(result) => result,
            Err(_) => Err(LocateError::Timeout(timeout)),
        }
    }
}

fn classify(err: zbus::Error) -> LocateError {
    let text = err.to_string();
    if text.contains("AccessDenied") || text.contains("not allowed") {
        LocateError::Denied(text)
    } else {
        LocateError::Unsupported(text)
    }
}

/// Always reports the configured position.
pub struct FixedLocator {
    coordinates: Coordinates,
}

impl FixedLocator {
    pub fn new(coordinates: Coordinates) -> Self {
        Self { coordinates }
    }
}

#[async_trait]
impl Locator for FixedLocator {
    async fn locate(&self, _timeout: Duration) -> Result<Coordinates, LocateError> {
        Ok(self.coordinates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_locator() {
        let locator = FixedLocator::new(Coordinates::new(12.9, 77.6));
        let coords = locator.locate(Duration::from_secs(1)).await.unwrap();
        assert_eq!(coords, Coordinates::new(12.9, 77.6));
    }

    #[test]
    fn test_classify_access_denied() {
        let err = zbus::Error::Failure(
            "org.freedesktop.DBus.Error.AccessDenied: 'attend' disallowed".into(),
        );
        assert!(matches!(classify(err), LocateError::Denied(_)));

        let err = zbus::Error::Failure("org.freedesktop.DBus.Error.ServiceUnknown".into());
        assert!(matches!(classify(err), LocateError::Unsupported(_)));
    }
}
