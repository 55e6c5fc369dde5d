//! Diesel schema for distributed task storage.

diesel::table! {
    /// Task rows shared by every orchestration process.
    distributed_tasks (id) {
        /// Task identifier.
        id -> Uuid,
        /// Task type.
        #[max_length = 50]
        task_type -> Varchar,
        /// Title, description, input, blockers, metadata, and tags.
        task_data -> Jsonb,
        /// Lifecycle status; the column every conditional write filters on.
        #[max_length = 20]
        status -> Varchar,
        /// Integer priority band.
        priority -> Int4,
        /// Failure impact.
        #[max_length = 20]
        criticality -> Varchar,
        /// Worker currently holding the task.
        assigned_worker_id -> Nullable<Uuid>,
        /// First worker that claimed the task.
        original_worker_id -> Nullable<Uuid>,
        /// Prerequisite task identifiers.
        dependencies -> Array<Uuid>,
        /// Retries consumed.
        retry_count -> Int4,
        /// Retry ceiling.
        max_retries -> Int4,
        /// Last error.
        error_message -> Nullable<Text>,
        /// Output payload.
        result_data -> Jsonb,
        /// Last checkpoint.
        checkpoint_data -> Jsonb,
        /// Expected run time in seconds.
        estimated_duration -> Nullable<Int8>,
        /// Start timestamp.
        started_at -> Nullable<Timestamptz>,
        /// Completion timestamp.
        completed_at -> Nullable<Timestamptz>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}
