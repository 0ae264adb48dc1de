pub const SELECT_ONGOING_ACTIVITIES: &str = r#"
SELECT id, title, organizer_id, route_id, status, activity_date, start_time, end_time
FROM activity WHERE status = 3 ORDER BY id;
"#;

pub const SELECT_ACTIVITY: &str = r#"
SELECT id, title, organizer_id, route_id, status, activity_date, start_time, end_time
FROM activity WHERE id = $1;
"#;

pub const SELECT_APPROVED_USERS: &str = r#"
SELECT DISTINCT user_id FROM registration WHERE activity_id = $1 AND status = 1 ORDER BY user_id;
"#;

pub const SELECT_IS_APPROVED: &str = r#"
SELECT EXISTS (
    SELECT 1 FROM registration WHERE user_id = $1 AND activity_id = $2 AND status = 1
);
"#;

pub const SELECT_ROUTE_POINTS: &str = r#"
SELECT route_id, sequence, latitude AS lat, longitude AS lng
FROM route_point WHERE route_id = $1 ORDER BY sequence;
"#;

pub const SELECT_CHECKPOINTS: &str = r#"
SELECT id, route_id, name, latitude AS lat, longitude AS lng, radius AS radius_meters, sequence,
       checkpoint_type, is_required, expected_arrive_minutes
FROM checkpoint WHERE route_id = $1 ORDER BY sequence;
"#;

pub const SELECT_CHECKPOINT: &str = r#"
SELECT id, route_id, name, latitude AS lat, longitude AS lng, radius AS radius_meters, sequence,
       checkpoint_type, is_required, expected_arrive_minutes
FROM checkpoint WHERE id = $1;
"#;

pub const SELECT_CHECK_IN_EXISTS: &str = r#"
SELECT EXISTS (
    SELECT 1 FROM check_in_record WHERE user_id = $1 AND activity_id = $2 AND checkpoint_id = $3
);
"#;

pub const INSERT_CHECK_IN: &str = r#"
INSERT INTO check_in_record (user_id, activity_id, checkpoint_id, check_in_time, latitude, longitude,
                             distance_to_checkpoint, status, remark)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
ON CONFLICT (user_id, activity_id, checkpoint_id) DO NOTHING
RETURNING id, user_id, activity_id, checkpoint_id, check_in_time, latitude AS lat, longitude AS lng,
          distance_to_checkpoint, status, remark;
"#;

pub const SELECT_USER_CHECK_INS: &str = r#"
SELECT id, user_id, activity_id, checkpoint_id, check_in_time, latitude AS lat, longitude AS lng,
       distance_to_checkpoint, status, remark
FROM check_in_record WHERE user_id = $1 AND activity_id = $2 ORDER BY check_in_time DESC;
"#;

pub const COUNT_CHECK_INS_AT_CHECKPOINT: &str = r#"
SELECT COUNT(DISTINCT user_id) FROM check_in_record WHERE activity_id = $1 AND checkpoint_id = $2;
"#;

pub const INSERT_TRACK_POINT: &str = r#"
INSERT INTO track_record (user_id, activity_id, latitude, longitude, elevation, accuracy, speed, record_time)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8);
"#;

pub const SELECT_RECENT_TRACKS: &str = r#"
SELECT user_id, activity_id, latitude AS lat, longitude AS lng, elevation, accuracy, speed, record_time
FROM track_record
WHERE user_id = $1 AND activity_id = $2 AND record_time >= $3
ORDER BY record_time DESC;
"#;

pub const SELECT_LATEST_TRACK: &str = r#"
SELECT user_id, activity_id, latitude AS lat, longitude AS lng, elevation, accuracy, speed, record_time
FROM track_record
WHERE user_id = $1 AND activity_id = $2
ORDER BY record_time DESC LIMIT 1;
"#;

pub const SELECT_OPEN_ALERT: &str = r#"
SELECT id, activity_id, user_id, alert_type, alert_level, latitude AS lat, longitude AS lng, description,
       trigger_time, handle_status, handle_by, handle_time, handle_remark
FROM alert_event
WHERE user_id = $1 AND activity_id = $2 AND alert_type = $3 AND handle_status IN (0, 1)
LIMIT 1;
"#;

/// Relies on the partial unique index over open alerts.
pub const INSERT_ALERT_IF_ABSENT: &str = r#"
INSERT INTO alert_event (id, activity_id, user_id, alert_type, alert_level, latitude, longitude, description,
                         trigger_time, handle_status)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
ON CONFLICT (user_id, activity_id, alert_type) WHERE handle_status IN (0, 1) DO NOTHING
RETURNING id, activity_id, user_id, alert_type, alert_level, latitude AS lat, longitude AS lng, description,
          trigger_time, handle_status, handle_by, handle_time, handle_remark;
"#;

pub const SELECT_ALERT: &str = r#"
SELECT id, activity_id, user_id, alert_type, alert_level, latitude AS lat, longitude AS lng, description,
       trigger_time, handle_status, handle_by, handle_time, handle_remark
FROM alert_event WHERE id = $1;
"#;

pub const UPDATE_ALERT_HANDLE: &str = r#"
UPDATE alert_event
SET handle_status = $2,
    handle_by = $3,
    handle_remark = $4,
    handle_time = $5
WHERE id = $1 AND handle_status IN (0, 1)
RETURNING id, activity_id, user_id, alert_type, alert_level, latitude AS lat, longitude AS lng, description,
          trigger_time, handle_status, handle_by, handle_time, handle_remark;
"#;

pub const SELECT_ALERT_PAGE: &str = r#"
SELECT id, activity_id, user_id, alert_type, alert_level, latitude AS lat, longitude AS lng, description,
       trigger_time, handle_status, handle_by, handle_time, handle_remark
FROM alert_event
WHERE ($1::BIGINT IS NULL OR activity_id = $1)
  AND ($2::SMALLINT IS NULL OR alert_type = $2)
  AND ($3::SMALLINT IS NULL OR alert_level = $3)
  AND ($4::SMALLINT IS NULL OR handle_status = $4)
  AND ($5::BIGINT IS NULL OR user_id = $5)
ORDER BY trigger_time DESC
LIMIT $6 OFFSET $7;
"#;

pub const COUNT_ALERTS: &str = r#"
SELECT COUNT(*)
FROM alert_event
WHERE ($1::BIGINT IS NULL OR activity_id = $1)
  AND ($2::SMALLINT IS NULL OR alert_type = $2)
  AND ($3::SMALLINT IS NULL OR alert_level = $3)
  AND ($4::SMALLINT IS NULL OR handle_status = $4)
  AND ($5::BIGINT IS NULL OR user_id = $5);
"#;

pub const COUNT_PENDING_ALERTS: &str = r#"
SELECT COUNT(*) FROM alert_event WHERE activity_id = $1 AND handle_status = 0;
"#;

pub const SUMMARIZE_ALERTS: &str = r#"
SELECT alert_type, alert_level, handle_status, COUNT(*) AS count
FROM alert_event WHERE activity_id = $1
GROUP BY alert_type, alert_level, handle_status;
"#;

pub const SELECT_DICT_VALUE: &str = r#"
SELECT value FROM dict_data WHERE dict_code = $1 AND label = $2 AND status = 1 LIMIT 1;
"#;

pub const SELECT_IS_ADMIN: &str = r#"
SELECT EXISTS (SELECT 1 FROM sys_user WHERE id = $1 AND role = 2);
"#;

pub const SELECT_NICKNAME: &str = r#"
SELECT nickname FROM sys_user WHERE id = $1;
"#;

pub const INSERT_ORGANIZER_MESSAGE: &str = r#"
INSERT INTO message (user_id, title, content, message_type, related_id, related_type)
SELECT organizer_id, $2, $3, 4, id, 'activity' FROM activity WHERE id = $1;
"#;
