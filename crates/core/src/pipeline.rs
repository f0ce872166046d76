//! 파이프라인 trait: 모듈 확장 포인트 정의

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::event::Notification;

/// 알림을 소비하는 이벤트 싱크 trait
///
/// 관찰자에게 알림을 전달하는 전송 계층(웹 API, 표준출력 등)은
/// 이 trait을 구현합니다. `emit`은 여러 스트림 워커에서 동시에
/// 호출될 수 있으므로 블로킹 없이 빠르게 반환해야 합니다.
pub trait EventSink: Send + Sync {
    /// 알림 하나를 전달합니다.
    fn emit(&self, notification: Notification);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, notification: Notification) {
        (**self).emit(notification);
    }
}

/// tokio unbounded 채널로 알림을 전달하는 싱크
///
/// 수신 측이 닫히면 알림은 버려지고 디버그 로그만 남습니다.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    /// 새 채널 싱크와 수신기를 생성합니다.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// 기존 송신기로 싱크를 만듭니다.
    pub fn from_sender(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, notification: Notification) {
        if let Err(e) = self.tx.send(notification) {
            tracing::debug!(kind = e.0.kind(), "notification receiver closed, dropping");
        }
    }
}

/// 모든 알림을 메모리에 보관하는 싱크 (테스트 및 진단용)
#[derive(Default)]
pub struct CollectingSink {
    notifications: Mutex<Vec<Notification>>,
}

impl CollectingSink {
    /// 빈 싱크를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금까지 받은 알림의 복사본을 반환합니다.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    /// 받은 알림을 모두 꺼내고 비웁니다.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.notifications.lock())
    }

    /// 받은 알림 수
    pub fn len(&self) -> usize {
        self.notifications.lock().len()
    }

    /// 받은 알림이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.notifications.lock().is_empty()
    }

    /// 특정 종류의 알림만 골라 반환합니다.
    pub fn of_kind(&self, kind: &str) -> Vec<Notification> {
        self.notifications
            .lock()
            .iter()
            .filter(|n| n.kind() == kind)
            .cloned()
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}

/// 모듈 헬스 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 주의 필요
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}
