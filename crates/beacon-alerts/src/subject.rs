//! The resource an issue is about.
//!
//! Subjects are classified from alert labels using a fixed priority list:
//! the first label present decides the [`SubjectType`]. Classification never
//! fails; an alert with none of the known labels gets [`SubjectType::None`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::{Alert, LabelSet};

/// Name given to subjects that could not be classified.
pub const UNKNOWN_SUBJECT: &str = "Unknown";

/// Kubernetes-like resource kinds an issue can be about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    /// A pod.
    Pod,
    /// A deployment.
    Deployment,
    /// A service.
    Service,
    /// A node (also used for `instance` labels).
    Node,
    /// A job.
    Job,
    /// A cron job.
    CronJob,
    /// A daemon set.
    DaemonSet,
    /// A stateful set.
    StatefulSet,
    /// A replica set.
    ReplicaSet,
    /// An ingress.
    Ingress,
    /// A config map.
    ConfigMap,
    /// A secret.
    Secret,
    /// A persistent volume.
    PersistentVolume,
    /// A persistent volume claim.
    PersistentVolumeClaim,
    /// A horizontal pod autoscaler.
    HorizontalPodAutoscaler,
    /// A namespace.
    Namespace,
    /// No known resource label was present.
    #[default]
    None,
}

/// Label → subject type, highest priority first.
const PRIORITY: &[(&str, SubjectType)] = &[
    ("pod", SubjectType::Pod),
    ("deployment", SubjectType::Deployment),
    ("service", SubjectType::Service),
    ("node", SubjectType::Node),
    ("instance", SubjectType::Node),
    ("job", SubjectType::Job),
    ("cronjob", SubjectType::CronJob),
    ("daemonset", SubjectType::DaemonSet),
    ("statefulset", SubjectType::StatefulSet),
    ("replicaset", SubjectType::ReplicaSet),
    ("ingress", SubjectType::Ingress),
    ("configmap", SubjectType::ConfigMap),
    ("secret", SubjectType::Secret),
    ("persistentvolume", SubjectType::PersistentVolume),
    ("persistentvolumeclaim", SubjectType::PersistentVolumeClaim),
    ("hpa", SubjectType::HorizontalPodAutoscaler),
    ("namespace", SubjectType::Namespace),
];

impl SubjectType {
    /// Returns the type as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pod => "pod",
            Self::Deployment => "deployment",
            Self::Service => "service",
            Self::Node => "node",
            Self::Job => "job",
            Self::CronJob => "cronjob",
            Self::DaemonSet => "daemonset",
            Self::StatefulSet => "statefulset",
            Self::ReplicaSet => "replicaset",
            Self::Ingress => "ingress",
            Self::ConfigMap => "configmap",
            Self::Secret => "secret",
            Self::PersistentVolume => "persistentvolume",
            Self::PersistentVolumeClaim => "persistentvolumeclaim",
            Self::HorizontalPodAutoscaler => "hpa",
            Self::Namespace => "namespace",
            Self::None => "none",
        }
    }

    /// Classifies a label set. Returns the type and the label it was taken from.
    #[must_use]
    pub fn classify(labels: &LabelSet) -> Option<(Self, &'static str)> {
        PRIORITY
            .iter()
            .find(|(label, _)| labels.contains_key(*label))
            .map(|(label, kind)| (*kind, *label))
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resource an issue concerns, with the alert's full label context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Resource name, or [`UNKNOWN_SUBJECT`].
    pub name: String,
    /// Resource kind.
    pub subject_type: SubjectType,
    /// Namespace, if labelled.
    pub namespace: Option<String>,
    /// Node, if labelled.
    pub node: Option<String>,
    /// Container, if labelled.
    pub container: Option<String>,
    /// Copy of the alert's labels.
    pub labels: LabelSet,
    /// Copy of the alert's annotations.
    pub annotations: LabelSet,
}

impl Subject {
    /// Builds the subject for an alert.
    #[must_use]
    pub fn from_alert(alert: &Alert) -> Self {
        let (name, subject_type) = match SubjectType::classify(&alert.labels) {
            Some((kind, label)) => (alert.label(label).unwrap_or(UNKNOWN_SUBJECT), kind),
            None => (UNKNOWN_SUBJECT, SubjectType::None),
        };

        Self {
            name: name.to_string(),
            subject_type,
            namespace: context_label(alert, "namespace"),
            node: context_label(alert, "node"),
            container: context_label(alert, "container"),
            labels: alert.labels.clone(),
            annotations: alert.annotations.clone(),
        }
    }

    /// Short human form, e.g. `pod payments/api-7d9f`.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.subject_type, &self.namespace) {
            (SubjectType::None, _) => self.name.clone(),
            (SubjectType::Namespace, _) | (_, None) => format!("{} {}", self.subject_type, self.name),
            (kind, Some(ns)) => format!("{kind} {ns}/{}", self.name),
        }
    }
}

fn context_label(alert: &Alert, key: &str) -> Option<String> {
    alert
        .label(key)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
