//! Fixtures shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};

use crate::api::{BoxFuture, DataSource};
use crate::error::AdminError;
use crate::models::{
    AckEnvelope, AlertRecord, GeoPoint, ReportRecord, ReportStatus, ReportsEnvelope,
    SirensEnvelope, UserRecord, UsersEnvelope,
};
use crate::siren::SirenDevice;

pub fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap()
}

pub fn user(id: &str, day: u32) -> UserRecord {
    UserRecord {
        id: id.to_string(),
        username: Some(format!("user_{id}")),
        college_email: Some(format!("{id}@campus.edu")),
        personal_email: None,
        phone: None,
        college: Some("Engineering".to_string()),
        course: Some("CSE".to_string()),
        year: Some("2026".to_string()),
        blood_group: None,
        medical_conditions: None,
        allergies: None,
        medications: None,
        emergency_contact: None,
        created_at: ts(day),
    }
}

pub fn report(id: &str, day: u32, status: ReportStatus) -> ReportRecord {
    ReportRecord {
        id: id.to_string(),
        user_id: Some(format!("owner-{id}")),
        title: Some(format!("Report {id}")),
        description: Some("Followed near the library".to_string()),
        harasser_details: None,
        location: Some(GeoPoint {
            latitude: 12.97,
            longitude: 77.59,
        }),
        status,
        created_at: ts(day),
    }
}

pub fn alert(id: &str, day: u32) -> AlertRecord {
    AlertRecord {
        id: id.to_string(),
        title: Some("SOS".to_string()),
        description: Some("Emergency near hostel".to_string()),
        location: Some(GeoPoint {
            latitude: 12.97,
            longitude: 77.59,
        }),
        time: ts(day),
    }
}

pub fn alerts(count: usize) -> Vec<AlertRecord> {
    (0..count).map(|i| alert(&format!("s{i}"), 1)).collect()
}

#[derive(Default)]
pub struct RecordingSiren {
    sounding: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl RecordingSiren {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl SirenDevice for RecordingSiren {
    fn start_loop(&self) -> Result<(), AdminError> {
        if !self.sounding.swap(true, Ordering::SeqCst) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn stop(&self) {
        if self.sounding.swap(false, Ordering::SeqCst) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_sounding(&self) -> bool {
        self.sounding.load(Ordering::SeqCst)
    }
}

/// In-memory stand-in for the admin REST API.
pub struct FakeSource {
    pub users: Mutex<Vec<UserRecord>>,
    pub reports: Mutex<Vec<ReportRecord>>,
    pub sirens: Mutex<Vec<AlertRecord>>,
    pub users_success: AtomicBool,
    pub reports_success: AtomicBool,
    pub sirens_success: AtomicBool,
    pub ack_success: AtomicBool,
    pub offline: AtomicBool,
    pub calls: Mutex<Vec<String>>,
}

impl Default for FakeSource {
    fn default() -> Self {
        Self {
            users: Mutex::new(Vec::new()),
            reports: Mutex::new(Vec::new()),
            sirens: Mutex::new(Vec::new()),
            users_success: AtomicBool::new(true),
            reports_success: AtomicBool::new(true),
            sirens_success: AtomicBool::new(true),
            ack_success: AtomicBool::new(true),
            offline: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeSource {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, endpoint: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(endpoint)).count()
    }

    fn record(&self, endpoint: &str) -> Result<(), AdminError> {
        self.calls.lock().unwrap().push(endpoint.to_string());
        if self.offline.load(Ordering::SeqCst) {
            return Err(AdminError::Status {
                endpoint: endpoint.to_string(),
                status: 503,
            });
        }
        Ok(())
    }

    fn ack(&self) -> AckEnvelope {
        AckEnvelope {
            success: self.ack_success.load(Ordering::SeqCst),
            msg: None,
        }
    }
}

impl DataSource for FakeSource {
    fn fetch_users(&self) -> BoxFuture<'_, Result<UsersEnvelope, AdminError>> {
        Box::pin(async move {
            self.record("/getusers")?;
            Ok(UsersEnvelope {
                success: self.users_success.load(Ordering::SeqCst),
                users: self.users.lock().unwrap().clone(),
            })
        })
    }

    fn fetch_reports(&self) -> BoxFuture<'_, Result<ReportsEnvelope, AdminError>> {
        Box::pin(async move {
            self.record("/reports")?;
            Ok(ReportsEnvelope {
                success: self.reports_success.load(Ordering::SeqCst),
                reports: self.reports.lock().unwrap().clone(),
            })
        })
    }

    fn fetch_sirens(&self) -> BoxFuture<'_, Result<SirensEnvelope, AdminError>> {
        Box::pin(async move {
            self.record("/getsirens")?;
            Ok(SirensEnvelope {
                success: self.sirens_success.load(Ordering::SeqCst),
                sirens: self.sirens.lock().unwrap().clone(),
            })
        })
    }

    fn delete_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<AckEnvelope, AdminError>> {
        Box::pin(async move {
            self.record(&format!("/deleteuser?userId={user_id}"))?;
            Ok(self.ack())
        })
    }

    fn change_status<'a>(
        &'a self,
        report_id: &'a str,
        status: &'a ReportStatus,
    ) -> BoxFuture<'a, Result<AckEnvelope, AdminError>> {
        Box::pin(async move {
            self.record(&format!("/changestatus {report_id} {status}"))?;
            Ok(self.ack())
        })
    }

    fn delete_report<'a>(
        &'a self,
        report_id: &'a str,
    ) -> BoxFuture<'a, Result<AckEnvelope, AdminError>> {
        Box::pin(async move {
            self.record(&format!("/deletereport {report_id}"))?;
            Ok(self.ack())
        })
    }
}
