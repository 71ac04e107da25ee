//! Attendance service

use serde_json::json;
use std::sync::Arc;

use super::report::{ReportFile, ReportFormat, ReportOutput};
use super::{QueryParams, Reported};
use crate::api::dto::{AttendanceRecord, AttendanceType, ListResponse, NewAttendance};
use crate::api::{ApiClient, ApiResult, MultipartForm, RequestOptions};
use crate::events::{AppEvent, EventBus, Resource};

#[derive(Clone)]
pub struct AttendanceService {
    api: Arc<ApiClient>,
    events: EventBus,
}

impl AttendanceService {
    pub fn new(api: Arc<ApiClient>, events: EventBus) -> Self {
        Self { api, events }
    }

    pub async fn list(&self, params: &QueryParams) -> ApiResult<ListResponse<AttendanceRecord>> {
        self.api
            .request_json(&params.apply("/attendance"), RequestOptions::get())
            .await
            .reported(&self.events, Resource::Attendance, "Failed to get attendance records")
    }

    /// Latest records, newest first
    pub async fn recent(&self, limit: u32) -> ApiResult<Vec<AttendanceRecord>> {
        let params = QueryParams::new()
            .with("limit", limit)
            .with("sort", "created_at")
            .with("order", "desc");
        Ok(self.list(&params).await?.data)
    }

    pub async fn get(&self, id: u64) -> ApiResult<serde_json::Value> {
        self.api
            .request(&format!("/attendance/{}", id), RequestOptions::get())
            .await
            .map(|p| p.into_json())
            .reported(
                &self.events,
                Resource::Attendance,
                &format!("Failed to get attendance record with ID {}", id),
            )
    }

    pub async fn list_for_personnel(
        &self,
        personnel_id: u64,
        params: &QueryParams,
    ) -> ApiResult<ListResponse<AttendanceRecord>> {
        self.api
            .request_json(
                &params.apply(&format!("/personnel/{}/attendance", personnel_id)),
                RequestOptions::get(),
            )
            .await
            .reported(&self.events, Resource::Attendance, "Failed to get attendance for personnel")
    }

    /// Record a check-in or check-out
    pub async fn record(&self, attendance: &NewAttendance) -> ApiResult<serde_json::Value> {
        let body = serde_json::to_value(attendance)?;
        let response = self
            .api
            .request("/attendance", RequestOptions::post(body))
            .await
            .map(|p| p.into_json())
            .reported(&self.events, Resource::Attendance, "Failed to record attendance")?;

        tracing::info!(
            personnel_id = attendance.personnel_id,
            attendance_type = attendance.attendance_type.as_str(),
            source = %attendance.source,
            "Attendance recorded"
        );
        self.events.emit(AppEvent::AttendanceRecorded {
            personnel_id: attendance.personnel_id,
            attendance_type: attendance.attendance_type,
        });
        Ok(response)
    }

    /// Let the backend recognize the face in `image` and record attendance for it
    pub async fn record_with_face(
        &self,
        image: Vec<u8>,
        attendance_type: AttendanceType,
    ) -> ApiResult<serde_json::Value> {
        let form = MultipartForm::new()
            .file("image", "face.jpg", "image/jpeg", image)
            .text("attendance_type", attendance_type.as_str());
        let response = self
            .api
            .upload_file("/attendance/face-recognition", form, None)
            .await
            .map(|p| p.into_json())
            .reported(
                &self.events,
                Resource::Attendance,
                "Failed to record attendance with face recognition",
            )?;

        let personnel_id = response
            .pointer("/attendance/personnel_id")
            .or_else(|| response.pointer("/data/personnel_id"))
            .and_then(|v| v.as_u64());
        if let Some(personnel_id) = personnel_id {
            self.events.emit(AppEvent::AttendanceRecorded {
                personnel_id,
                attendance_type,
            });
        }
        Ok(response)
    }

    pub async fn update(&self, id: u64, changes: serde_json::Value) -> ApiResult<serde_json::Value> {
        let response = self
            .api
            .request(&format!("/attendance/{}", id), RequestOptions::put(changes))
            .await
            .map(|p| p.into_json())
            .reported(
                &self.events,
                Resource::Attendance,
                &format!("Failed to update attendance record with ID {}", id),
            )?;

        self.events.emit(AppEvent::AttendanceUpdated { id });
        Ok(response)
    }

    pub async fn delete(&self, id: u64) -> ApiResult<()> {
        self.api
            .request(&format!("/attendance/{}", id), RequestOptions::delete())
            .await
            .reported(
                &self.events,
                Resource::Attendance,
                &format!("Failed to delete attendance record with ID {}", id),
            )?;

        self.events.emit(AppEvent::AttendanceDeleted { id });
        Ok(())
    }

    pub async fn statistics(&self, params: &QueryParams) -> ApiResult<serde_json::Value> {
        self.api
            .request(&params.apply("/attendance/statistics"), RequestOptions::get())
            .await
            .map(|p| p.into_json())
            .reported(&self.events, Resource::Attendance, "Failed to get attendance statistics")
    }

    /// JSON report data, or a downloaded file for pdf/csv/excel
    pub async fn generate_report(
        &self,
        format: ReportFormat,
        params: &QueryParams,
    ) -> ApiResult<ReportOutput> {
        let result = if format.is_file() {
            let params = params.clone().with("format", format.as_str());
            self.api
                .download(&params.apply("/attendance/report"), RequestOptions::get())
                .await
                .map(|file| {
                    ReportOutput::File(ReportFile::new("attendance_report", format, file))
                })
        } else {
            let mut body = params.to_json();
            body["format"] = json!(format.as_str());
            self.api
                .request("/attendance/report", RequestOptions::post(body))
                .await
                .map(|p| ReportOutput::Data(p.into_json()))
        };

        result.reported(&self.events, Resource::Attendance, "Failed to generate attendance report")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{HttpMethod, HttpResponse};
    use crate::events::EventKind;
    use crate::testing::{json_response, sign_in, test_context};
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_record_posts_type_and_emits() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let r = Arc::clone(&recorded);
        ctx.events.on(EventKind::AttendanceRecorded, move |e| {
            if let AppEvent::AttendanceRecorded {
                personnel_id,
                attendance_type,
            } = e
            {
                r.lock().unwrap().push((*personnel_id, *attendance_type));
            }
            Ok(())
        });
        transport.push(
            HttpMethod::Post,
            "/attendance",
            json_response(201, json!({"success": true})),
        );

        ctx.services
            .attendance
            .record(&NewAttendance::from_face(5, AttendanceType::Out))
            .await
            .unwrap();

        let body = &transport.bodies(HttpMethod::Post, "/attendance")[0];
        assert_eq!(body["personnel_id"], 5);
        assert_eq!(body["attendance_type"], "out");
        assert_eq!(body["source"], "face_recognition");
        assert_eq!(*recorded.lock().unwrap(), vec![(5, AttendanceType::Out)]);
    }

    #[tokio::test]
    async fn test_recent_requests_sorted_limit() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        transport.push(
            HttpMethod::Get,
            "/attendance",
            json_response(200, json!({"data": [{"id": 1, "personnel_id": 2}]})),
        );

        let records = ctx.services.attendance.recent(5).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(
            transport.endpoint_of(&transport.calls()[0].url),
            "/attendance?limit=5&sort=created_at&order=desc"
        );
    }

    #[tokio::test]
    async fn test_file_report_is_downloaded_with_query() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        transport.push(
            HttpMethod::Get,
            "/attendance/report",
            HttpResponse {
                status: 200,
                content_type: Some("text/csv".to_string()),
                body: b"id,name\n".to_vec(),
            },
        );

        let output = ctx
            .services
            .attendance
            .generate_report(ReportFormat::Csv, &QueryParams::new().with("date_from", "2024-05-01"))
            .await
            .unwrap();

        match output {
            ReportOutput::File(file) => {
                assert!(file.filename.starts_with("attendance_report_"));
                assert!(file.filename.ends_with(".csv"));
            }
            other => panic!("expected file, got {:?}", other),
        }
        assert_eq!(
            transport.endpoint_of(&transport.calls()[0].url),
            "/attendance/report?date_from=2024-05-01&format=csv"
        );
    }
}
